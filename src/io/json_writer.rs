use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::error::IoError;

/// Write `value` as pretty-printed JSON followed by a newline
pub async fn write_json<T, W>(value: &T, mut writer: W) -> Result<(), IoError>
where
    T: Serialize + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Write `value` as a single compact JSON line (NDJSON)
pub async fn write_json_line<T, W>(value: &T, mut writer: W) -> Result<(), IoError>
where
    T: Serialize + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
