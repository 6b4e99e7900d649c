use chrono::Local;

use crate::app::{AppContext, Result};
use crate::batch::BatchOutcome;
use crate::domain::Product;
use crate::store::Store;

/// Manual trigger: one full batch, then the confirmation line.
pub async fn run_now(ctx: &AppContext) -> Result<()> {
    match ctx.runner.run_once().await? {
        BatchOutcome::Completed(summary) => {
            tracing::info!(
                candidates = summary.candidates,
                updated = summary.updated,
                failed = summary.failed,
                "Manual run finished"
            );
            println!("Update Processed");
        }
        BatchOutcome::AlreadyRunning => {
            println!("Another update is already running");
        }
    }
    Ok(())
}

pub fn list_candidates(ctx: &AppContext) -> Result<()> {
    let candidates = ctx.store.get_candidates()?;

    if candidates.is_empty() {
        println!("No candidates");
        return Ok(());
    }

    for product in candidates {
        let sku = product.barcode().unwrap_or("(no SKU, skipped)");
        println!("{:>6}  {}  {}", product.id, sku, product.display_title());
    }

    Ok(())
}

pub fn add_product(ctx: &AppContext, sku: &str, title: Option<&str>) -> Result<()> {
    let product = Product::new(title.unwrap_or_default(), Some(sku.to_string()));
    let id = ctx.store.add_product(&product)?;
    println!("Added product {}: {}", id, sku);
    Ok(())
}

pub fn list_products(ctx: &AppContext) -> Result<()> {
    let products = ctx.store.get_all_products()?;

    if products.is_empty() {
        println!("No products");
        return Ok(());
    }

    for product in products {
        let description = if product.description.is_empty() { " " } else { "D" };
        let image = if product.image_id.is_some() { "I" } else { " " };
        println!(
            "{:>6} [{}{}] {:<8} {}  {}",
            product.id,
            description,
            image,
            product.status.as_str(),
            product.sku.as_deref().unwrap_or("-"),
            product.display_title()
        );
    }

    Ok(())
}

pub fn install(ctx: &AppContext) -> Result<()> {
    let job = ctx.runner.scheduler().install()?;
    println!(
        "Next update scheduled for {}",
        job.due_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

pub fn uninstall(ctx: &AppContext) -> Result<()> {
    if ctx.runner.scheduler().uninstall()? {
        println!("Scheduled update cancelled");
    } else {
        println!("No update was scheduled");
    }
    Ok(())
}
