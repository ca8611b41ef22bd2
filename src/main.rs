use anyhow::Result;

use mlaudit::config::AuditConfig;
use mlaudit::context::RunContext;
use mlaudit::exchange::providers_from_env;
use mlaudit::orchestrator::run_audit;
use mlaudit::render::render;
use mlaudit::store::AuditStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AuditConfig::from_env();
    let ctx = RunContext::from_config(&cfg)?;
    let store = AuditStore::open_or_empty(&cfg.db_path, &ctx)?;
    let providers = providers_from_env(&cfg);

    let (report, card) = run_audit(&cfg, &ctx, &store, &providers).await;
    println!("{}", render(&report, &card));
    Ok(())
}
