use std::path::PathBuf;

use super::AppContext;
use crate::error::Result;
use crate::pipeline::{IngestReport, Pipeline, Workspace};

/// Copy each file into the conversation folder and index it under the
/// conversation's namespace. Stops at the first file that fails.
pub async fn upload_files(ctx: &AppContext, name: &str, files: &[PathBuf]) -> Result<Vec<IngestReport>> {
    let conversation = ctx.conversation(name)?;
    let loader = ctx.loader();
    let splitter = ctx.splitter()?;
    let embedder = ctx.embedder()?;
    let index = ctx.vector_index().await?;
    let workspace = Workspace::new(
        &ctx.config.upload_folder,
        Pipeline::new(&loader, &splitter, &embedder, index.as_ref()),
    );

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let report = workspace.upload(&conversation.name, file).await.inspect_err(|e| {
            tracing::error!(file = %file.display(), conversation = %conversation.name, error = %e, "upload failed");
        })?;
        reports.push(report);
    }
    Ok(reports)
}
