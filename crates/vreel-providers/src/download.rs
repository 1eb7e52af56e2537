//! Chunked HTTP body downloads.

use std::path::Path;

use futures::StreamExt;
use reqwest::Response;
use tokio::io::AsyncWriteExt;

use crate::error::ProviderResult;

/// Stream a response body to disk, returning the byte count.
///
/// Media bodies run to tens of megabytes; they never sit fully in memory.
pub(crate) async fn stream_to_file(response: Response, dest: &Path) -> ProviderResult<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(written)
}
