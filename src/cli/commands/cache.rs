//! Cache command - inspect or clear a project's selection cache

use crate::cache::{SelectionCache, CACHE_FILE_NAME};
use crate::cli::args::{CacheAction, CacheArgs};
use crate::error::{DtlError, DtlResult};
use crate::ui::{self, UiContext};
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Execute the cache command
pub async fn execute(args: CacheArgs) -> DtlResult<()> {
    let dir = match args.project {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| DtlError::io("getting current directory", e))?,
    };
    let path = dir.join(CACHE_FILE_NAME);

    match args.action {
        CacheAction::Show => show_cache(path),
        CacheAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        CacheAction::Clear { yes } => clear_cache(path, yes).await,
    }
}

fn show_cache(path: PathBuf) -> DtlResult<()> {
    if !path.exists() {
        println!("No cached decisions in {}", path.display());
        return Ok(());
    }

    if let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) {
        let modified: DateTime<Local> = modified.into();
        eprintln!("# {} (updated {})", path.display(), modified.format("%Y-%m-%d %H:%M"));
    }

    let cache = SelectionCache::open(path);
    println!("{}", serde_json::to_string_pretty(cache.values())?);
    Ok(())
}

async fn clear_cache(path: PathBuf, yes: bool) -> DtlResult<()> {
    let ctx = UiContext::detect();

    if !path.exists() {
        ui::step_info(&ctx, "Nothing to clear");
        return Ok(());
    }

    if !yes {
        if !ctx.is_interactive() {
            return Err(DtlError::User(
                "Refusing to clear the cache without confirmation; pass --yes".to_string(),
            ));
        }
        let prompt = format!("Forget every decision stored in {}?", path.display());
        if !ui::confirm(&prompt, false).await? {
            ui::step_info(&ctx, "Cache kept");
            return Ok(());
        }
    }

    tokio::fs::remove_file(&path)
        .await
        .map_err(|e| DtlError::io(format!("removing {}", path.display()), e))?;
    ui::step_ok(&ctx, &format!("Removed {}", path.display()));
    Ok(())
}
