use anyhow::{Context, Result, bail};
use catalog_diff::{ProductId, ProductKey, SnapshotStore};
use catalog_diff_store::SqliteSnapshotStore;

pub async fn run(store: &SqliteSnapshotStore, id: &str) -> Result<()> {
    let key = ProductKey::parse(&ProductId::new(id), store.key_format())
        .with_context(|| format!("invalid product id: {id}"))?;

    let Some(snapshot) = store
        .find(&key)
        .await
        .context("failed to read snapshot")?
    else {
        bail!("No snapshot for product {id} in catalog {}", store.catalog());
    };

    println!("Product:      {}", snapshot.key);
    println!("Hash:         {}", snapshot.competitors_hash);
    println!("Last checked: {}", snapshot.last_checked.to_rfc3339());
    println!("Last changed: {}", snapshot.last_changed.to_rfc3339());
    println!("Competitors:  {}", snapshot.competitors.len());
    for competitor in &snapshot.competitors {
        println!("  {competitor}");
    }

    Ok(())
}
