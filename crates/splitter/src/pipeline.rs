use crate::batcher::{BatchBound, SequenceBatcher, SplitSummary, measure};
use crate::error::SplitError;
use crate::writer::BatchWriter;
use model::paths;
use model::split::SplitMode;
use std::io::Write;
use storage::{ReadableLineSource, RemoteConfig, SourceLocation, StagingArea};
use tracing::info;

fn open_all(
    locations: &[SourceLocation],
    remote: &RemoteConfig,
) -> Result<Vec<Box<dyn ReadableLineSource>>, SplitError> {
    locations
        .iter()
        .map(|loc| storage::open_line_source(loc, remote).map_err(SplitError::from))
        .collect()
}

/// Split a collection of inputs into sealed batches under
/// `<results>/query_batches/`, and stage the manifest and grand-total
/// metadata beside them. Proportional mode performs its measuring pre-pass
/// here, which reads every input twice.
pub fn split_collection(
    inputs: &[String],
    mode: SplitMode,
    results: &str,
    staging: &mut StagingArea,
    remote: &RemoteConfig,
) -> Result<SplitSummary, SplitError> {
    let locations: Vec<SourceLocation> = inputs
        .iter()
        .map(|raw| SourceLocation::resolve(raw))
        .collect();

    let bound = match mode {
        SplitMode::Strict { batch_len } => BatchBound::strict(batch_len),
        SplitMode::Proportional { parts } => {
            let mut sources = open_all(&locations, remote)?;
            let total = measure(&mut sources)?;
            let share = mode.batch_len(total);
            info!(
                total_length = total,
                parts, share, "Measured input for proportional split"
            );
            BatchBound::proportional(share)
        }
    };

    let out_dir = paths::batch_dir(results);
    let summary = {
        let mut writer = BatchWriter::new(staging, &out_dir);
        let mut batcher = SequenceBatcher::new(&mut writer, bound);
        for location in &locations {
            let mut source = storage::open_line_source(location, remote)?;
            batcher.consume(source.as_mut())?;
        }
        batcher.finish()?
    };

    write_split_metadata(staging, results, &summary)?;
    info!(
        batches = summary.batches.len(),
        total_length = summary.total_length,
        "Input split"
    );
    Ok(summary)
}

/// Stage the manifest and the grand-total side channel under the metadata
/// prefix. They travel to the results location with the batches on flush.
fn write_split_metadata(
    staging: &mut StagingArea,
    results: &str,
    summary: &SplitSummary,
) -> Result<(), SplitError> {
    let manifest_loc =
        SourceLocation::resolve(&paths::metadata_file(results, paths::MANIFEST_FILE));
    let mut writer = staging.open_for_write(&manifest_loc)?;
    for batch in &summary.batches {
        writeln!(writer, "{batch}")?;
    }
    writer.flush()?;

    let length_loc =
        SourceLocation::resolve(&paths::metadata_file(results, paths::QUERY_LENGTH_FILE));
    let mut writer = staging.open_for_write(&length_loc)?;
    write!(writer, "{}", summary.total_length)?;
    writer.flush()?;
    Ok(())
}
