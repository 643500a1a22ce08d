use std::path::Path;

use vharvest_media::check_ytdlp;
use vharvest_worker::HarvestConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = HarvestConfig::from_env();

    println!(
        "harvest-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_ytdlp(&config.ytdlp_path)?;
    ensure_storage_env()?;

    println!("harvest-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

fn ensure_ytdlp(program: &str) -> anyhow::Result<()> {
    let path = check_ytdlp(program).map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("harvest-selfcheck: yt-dlp at {}", path.display());
    Ok(())
}

fn ensure_storage_env() -> anyhow::Result<()> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_default();
    if backend.eq_ignore_ascii_case("memory") {
        return Ok(());
    }
    for var in ["AWS_BUCKET_NAME", "AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"] {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
