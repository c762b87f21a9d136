//! Chart loading: unpacked directories, gzipped tar archives, and upward
//! resolution from any file inside a chart.

use dowser::{Chart, ChartFile};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::debug;
use walkdir::WalkDir;
use yaml_rust2::YamlLoader;

/// First bytes of a gzip stream with deflate compression.
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error, PathBuf),
    NoChartYaml(PathBuf),
    Archive(PathBuf, String),
    Metadata(PathBuf, String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io(e, path) => write!(f, "{}: {}", path.display(), e),
            LoadError::NoChartYaml(path) => {
                write!(f, "no Chart.yaml found for {}", path.display())
            }
            LoadError::Archive(path, msg) => write!(f, "{}: {}", path.display(), msg),
            LoadError::Metadata(path, msg) => {
                write!(f, "{}: Chart.yaml: {}", path.display(), msg)
            }
        }
    }
}

impl Error for LoadError {}

/// Resolves a CLI chart argument to a loadable root: a chart directory or
/// an archive file. A plain file inside a chart resolves by walking upward
/// to the nearest directory containing `Chart.yaml`.
pub fn resolve_root(path: &Path) -> Result<PathBuf, LoadError> {
    if path.is_dir() {
        return Ok(path.to_path_buf());
    }
    if !path.is_file() {
        return Err(LoadError::NoChartYaml(path.to_path_buf()));
    }
    if is_gzip(path)? {
        return Ok(path.to_path_buf());
    }
    let mut dir = path.parent();
    while let Some(d) = dir {
        if d.join("Chart.yaml").is_file() {
            return Ok(d.to_path_buf());
        }
        dir = d.parent();
    }
    Err(LoadError::NoChartYaml(path.to_path_buf()))
}

/// Loads a chart from a directory or a gzipped tar archive.
pub fn load(path: &Path) -> Result<Chart, LoadError> {
    if path.is_dir() {
        return load_dir(path);
    }
    if path.is_file() && is_gzip(path)? {
        return load_archive(path);
    }
    Err(LoadError::NoChartYaml(path.to_path_buf()))
}

fn is_gzip(path: &Path) -> Result<bool, LoadError> {
    let mut file = fs::File::open(path).map_err(|e| LoadError::Io(e, path.to_path_buf()))?;
    let mut magic = [0u8; 3];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(_) => Ok(false),
    }
}

fn chart_name(data: &[u8], origin: &Path) -> Result<String, LoadError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| LoadError::Metadata(origin.to_path_buf(), "not valid UTF-8".to_string()))?;
    let docs = YamlLoader::load_from_str(text)
        .map_err(|e| LoadError::Metadata(origin.to_path_buf(), e.to_string()))?;
    docs.first()
        .and_then(|doc| doc["name"].as_str())
        .map(str::to_string)
        .ok_or_else(|| LoadError::Metadata(origin.to_path_buf(), "missing name".to_string()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|e| LoadError::Io(e, path.to_path_buf()))
}

fn load_dir(root: &Path) -> Result<Chart, LoadError> {
    let meta_path = root.join("Chart.yaml");
    if !meta_path.is_file() {
        return Err(LoadError::NoChartYaml(root.to_path_buf()));
    }
    let name = chart_name(&read_file(&meta_path)?, root)?;
    debug!("loading chart {} from {}", name, root.display());
    let mut chart = Chart {
        name,
        ..Chart::default()
    };

    let mut top_level: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| LoadError::Io(e, root.to_path_buf()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    top_level.sort();
    for path in &top_level {
        if path.is_file() {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            chart.raw.push(ChartFile::new(file_name, read_file(path)?));
        }
    }

    let templates_dir = root.join("templates");
    if templates_dir.is_dir() {
        for entry in WalkDir::new(&templates_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("walked path is under the chart root");
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            chart
                .templates
                .push(ChartFile::new(name, read_file(entry.path())?));
        }
    }

    let charts_dir = root.join("charts");
    if charts_dir.is_dir() {
        let mut deps: Vec<PathBuf> = fs::read_dir(&charts_dir)
            .map_err(|e| LoadError::Io(e, charts_dir.clone()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        deps.sort();
        for dep in &deps {
            if dep.is_dir() {
                chart.dependencies.push(load_dir(dep)?);
            } else if dep.is_file() && is_gzip(dep)? {
                chart.dependencies.push(load_archive(dep)?);
            }
        }
    }

    Ok(chart)
}

fn load_archive(path: &Path) -> Result<Chart, LoadError> {
    let data = read_file(path)?;
    load_archive_bytes(&data, path)
}

fn load_archive_bytes(data: &[u8], origin: &Path) -> Result<Chart, LoadError> {
    let gz = GzDecoder::new(data);
    let mut archive = tar::Archive::new(gz);
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| LoadError::Archive(origin.to_path_buf(), e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| LoadError::Archive(origin.to_path_buf(), e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let entry_path = entry
            .path()
            .map_err(|e| LoadError::Archive(origin.to_path_buf(), e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| LoadError::Archive(origin.to_path_buf(), e.to_string()))?;
        files.push((entry_path, contents));
    }

    // Archive entries live under a single top-level chart directory.
    let stripped: Vec<(String, Vec<u8>)> = files
        .into_iter()
        .filter_map(|(name, data)| {
            name.split_once('/')
                .map(|(_, rest)| (rest.to_string(), data))
        })
        .collect();
    assemble(stripped, origin)
}

/// Builds a chart (and, recursively, its dependencies) from chart-relative
/// file paths.
fn assemble(files: Vec<(String, Vec<u8>)>, origin: &Path) -> Result<Chart, LoadError> {
    let meta = files
        .iter()
        .find(|(name, _)| name == "Chart.yaml")
        .ok_or_else(|| LoadError::NoChartYaml(origin.to_path_buf()))?;
    let name = chart_name(&meta.1, origin)?;
    let mut chart = Chart {
        name,
        ..Chart::default()
    };

    let mut dep_files: BTreeMap<String, Vec<(String, Vec<u8>)>> = BTreeMap::new();
    let mut dep_archives: Vec<Vec<u8>> = Vec::new();
    for (file_name, data) in files {
        if let Some(rest) = file_name.strip_prefix("charts/") {
            match rest.split_once('/') {
                Some((dep, sub)) => dep_files
                    .entry(dep.to_string())
                    .or_default()
                    .push((sub.to_string(), data)),
                None => {
                    if rest.ends_with(".tgz") {
                        dep_archives.push(data);
                    }
                }
            }
        } else if file_name.starts_with("templates/") {
            chart.templates.push(ChartFile::new(file_name, data));
        } else if !file_name.contains('/') {
            chart.raw.push(ChartFile::new(file_name, data));
        }
    }

    for (_, sub_files) in dep_files {
        chart.dependencies.push(assemble(sub_files, origin)?);
    }
    for data in dep_archives {
        chart.dependencies.push(load_archive_bytes(&data, origin)?);
    }
    Ok(chart)
}
