use crate::error::{ErrorKind, Result};
use artifs_vfs::{VirtualNode, VirtualTree};
use exn::ResultExt;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncWriteExt;

/// Render epoch milliseconds for humans; `-` for the zero "unknown" value.
pub fn format_millis(millis: i64) -> String {
    if millis == 0 {
        return "-".to_string();
    }
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .unwrap_or_else(|| millis.to_string())
}

fn kind_marker(is_directory: bool) -> char {
    match is_directory {
        true => 'd',
        false => '-',
    }
}

pub async fn ls(tree: &VirtualTree, key: &str) -> Result<()> {
    let node = tree.root().child(key);
    if node.is_file().await {
        let modified = format_millis(node.last_modified().await);
        println!("{} {:>12} {modified} {}", kind_marker(false), node.length().await, node.key());
        return Ok(());
    }
    if !node.is_directory().await {
        exn::bail!(ErrorKind::NotFound(node.key().to_string()));
    }
    let mut children = node.list().await;
    children.sort_by(|a, b| a.name().cmp(b.name()));
    for child in children {
        let is_directory = child.is_directory().await;
        let name = match is_directory {
            true => format!("{}/", child.name()),
            false => child.name().to_string(),
        };
        let modified = format_millis(child.last_modified().await);
        println!("{} {:>12} {modified} {name}", kind_marker(is_directory), child.length().await);
    }
    Ok(())
}

pub async fn stat(tree: &VirtualTree, key: &str) -> Result<()> {
    let node = tree.root().child(key);
    let kind = if node.is_directory().await {
        "directory"
    } else if node.is_file().await {
        "file"
    } else {
        exn::bail!(ErrorKind::NotFound(node.key().to_string()));
    };
    println!("key:      {}", node.key());
    println!("kind:     {kind}");
    println!("size:     {}", node.length().await);
    println!("modified: {}", format_millis(node.last_modified().await));
    if let Ok(url) = node.external_url() {
        println!("url:      {url}");
    }
    Ok(())
}

async fn open(node: &VirtualNode) -> Result<artifs_transfer::backend::ByteStream> {
    node.open().await.or_raise(|| ErrorKind::Tree)
}

pub async fn cat(tree: &VirtualTree, key: &str) -> Result<()> {
    let mut stream = open(&tree.root().child(key)).await?;
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut stream, &mut stdout).await.or_raise(|| ErrorKind::Io)?;
    stdout.flush().await.or_raise(|| ErrorKind::Io)
}

pub async fn get(tree: &VirtualTree, key: &str, destination: &Path) -> Result<()> {
    let mut stream = open(&tree.root().child(key)).await?;
    let mut file = tokio::fs::File::create(destination).await.or_raise(|| ErrorKind::Io)?;
    let bytes = tokio::io::copy(&mut stream, &mut file).await.or_raise(|| ErrorKind::Io)?;
    file.flush().await.or_raise(|| ErrorKind::Io)?;
    tracing::info!(key, destination = %destination.display(), bytes, "Downloaded");
    Ok(())
}

pub async fn put(tree: &VirtualTree, file: &Path, key: &str) -> Result<()> {
    let target = tree.root().child(key);
    tree.client().upload(file, target.key()).await.or_raise(|| ErrorKind::Transfer)
}

pub async fn rm(tree: &VirtualTree, key: &str) -> Result<()> {
    tree.client().delete(tree.root().child(key).key()).await.or_raise(|| ErrorKind::Transfer)
}

pub async fn mv(tree: &VirtualTree, source: &str, target: &str) -> Result<()> {
    let root = tree.root();
    tree.client().rename(root.child(source).key(), root.child(target).key()).await.or_raise(|| ErrorKind::Transfer)
}

pub async fn cp(tree: &VirtualTree, source: &str, target: &str) -> Result<()> {
    let root = tree.root();
    tree.client().copy(root.child(source).key(), root.child(target).key()).await.or_raise(|| ErrorKind::Transfer)
}

pub fn url(tree: &VirtualTree, key: &str) -> Result<()> {
    let url = tree.root().child(key).external_url().or_raise(|| ErrorKind::Tree)?;
    println!("{url}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "-");
        assert_eq!(format_millis(1_710_681_619_836), "2024-03-17T13:20:19.836Z");
    }
}
