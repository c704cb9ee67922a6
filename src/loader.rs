use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};
use tracing_error::SpanTrace;

use crate::domain::{TSConfig, TSError};
use crate::table::{Cell, Header, Row, Table};

#[derive(Debug, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A loaded column: its name and one display string per row.
pub type RawColumn = (String, Vec<String>);

/// Loads a data file into a table. `~` and environment variables in the
/// path are expanded first.
#[instrument(skip(config))]
pub fn load_table(path: &str, config: &TSConfig) -> Result<Table, TSError> {
    let expanded = shellexpand::full(path)
        .map_err(|e| TSError::LoadingFailed(e.to_string(), SpanTrace::capture()))?;
    let file_info = get_file_info(PathBuf::from(expanded.as_ref()))?;
    debug!("Loading {:?}", file_info);

    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    // Each column is converted to strings in its own thread.
    let start_time = Instant::now();
    let df = frame.collect()?;
    let columns: Result<Vec<RawColumn>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let columns = columns?;
    info!(
        "Loading {} bytes took {}ms ...",
        file_info.file_size,
        start_time.elapsed().as_millis()
    );

    let name = file_info
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    table_from_columns(name, columns, config)
}

/// Assembles a table from raw columns. Columns ending in the configured
/// timestamp suffix are not displayed; they provide the sort values of the
/// column they are named after.
pub fn table_from_columns(
    name: String,
    columns: Vec<RawColumn>,
    config: &TSConfig,
) -> Result<Table, TSError> {
    let suffix = config.timestamp_suffix.as_str();
    let nrows = columns.iter().map(|(_, data)| data.len()).max().unwrap_or(0);

    let (overrides, visible): (Vec<RawColumn>, Vec<RawColumn>) = columns
        .into_iter()
        .partition(|(cname, _)| !suffix.is_empty() && cname.ends_with(suffix));

    for (oname, _) in overrides.iter() {
        let target = &oname[..oname.len() - suffix.len()];
        if !visible.iter().any(|(cname, _)| cname == target) {
            return Err(TSError::UnknownColumn(target.to_string()));
        }
    }

    for inert in config.inert_columns.iter() {
        if !visible.iter().any(|(cname, _)| cname == inert) {
            return Err(TSError::UnknownColumn(inert.clone()));
        }
    }

    let headers = visible
        .iter()
        .map(|(cname, _)| {
            if config.inert_columns.contains(cname) {
                Header::inert(cname.clone())
            } else {
                Header::sortable(cname.clone())
            }
        })
        .collect::<Vec<Header>>();

    let sort_values: Vec<Option<&Vec<String>>> = visible
        .iter()
        .map(|(cname, _)| {
            let oname = format!("{cname}{suffix}");
            overrides
                .iter()
                .find(|(n, _)| *n == oname)
                .map(|(_, data)| data)
        })
        .collect();

    let rows = (0..nrows)
        .map(|ridx| {
            let cells = visible
                .iter()
                .zip(sort_values.iter())
                .map(|((_, data), sort_data)| {
                    let text = data.get(ridx).map(String::as_str).unwrap_or_default();
                    match sort_data.and_then(|d| d.get(ridx)).filter(|v| !v.is_empty()) {
                        Some(value) => Cell::with_sort_value(text, value.as_str()),
                        None => Cell::new(text),
                    }
                })
                .collect();
            Row::new(cells)
        })
        .collect();

    let table = Table::new(name, headers, rows);
    debug!("Built table {}", table);
    Ok(table)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<RawColumn, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| s.to_string()).unwrap_or_default())
        .collect();
    Ok((col_name.to_string(), data))
}

fn detect_file_type(path: &Path) -> Result<FileType, TSError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TSError::UnknownFileType(path.to_path_buf())),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TSError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TSError::FileNotFound(path.clone()),
        ErrorKind::PermissionDenied => TSError::PermissionDenied(path.clone()),
        _ => TSError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TSError::LoadingFailed(
            format!("{} is not a file", path.display()),
            SpanTrace::capture(),
        ));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

// Every column is read as a string, so the display text is exactly what the file holds.
fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
