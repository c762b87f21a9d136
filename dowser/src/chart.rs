//! In-memory chart model handed to the analyzer by a loader.

/// One file inside a chart. `name` is a forward-slash path relative to the
/// chart root, e.g. `templates/deployment.yaml`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChartFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl ChartFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> ChartFile {
        ChartFile {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A loaded Helm chart: its template files, its top-level raw files
/// (including `values.yaml`), and its dependency charts.
#[derive(Clone, Debug, Default)]
pub struct Chart {
    pub name: String,
    pub templates: Vec<ChartFile>,
    pub raw: Vec<ChartFile>,
    pub dependencies: Vec<Chart>,
}

impl Chart {
    pub fn raw_file(&self, name: &str) -> Option<&ChartFile> {
        self.raw.iter().find(|f| f.name == name)
    }

    pub fn values_file(&self) -> Option<&ChartFile> {
        self.raw_file("values.yaml")
    }
}
