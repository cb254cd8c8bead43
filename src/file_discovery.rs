use crate::config::FileConfig;
use crate::error::{Result, XmlToolingError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, warn};

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// Finds the documents to round-trip below a file or directory
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lowercase extensions without the leading dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// None = unlimited
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    /// Build a discovery engine from the `[files]` configuration section
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::new()
            .with_extensions(config.extensions.clone())
            .with_include_patterns(&config.include_patterns)?
            .with_exclude_patterns(&config.exclude_patterns)
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only files matching at least one pattern are kept
    pub fn with_include_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.include_set = build_glob_set(patterns)?;
        Ok(self)
    }

    /// Files matching any pattern are skipped
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude_set = build_glob_set(patterns)?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Discover matching files, sorted by path. A file argument is returned
    /// as-is when it passes the filters.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;

        if metadata.is_file() {
            return Ok(if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }
        if !metadata.is_dir() {
            return Err(XmlToolingError::FileSystemTraversal {
                path: path.to_path_buf(),
                reason: "not a regular file or directory".to_string(),
            });
        }

        let mut files = Vec::new();
        self.walk(path, 0, &mut files).await?;
        files.sort();
        debug!(root = %path.display(), count = files.len(), "Discovered files");
        Ok(files)
    }

    /// Entries of `dir` sit at `depth`; unreadable entries are logged and skipped
    fn walk<'a>(&'a self, dir: &'a Path, depth: usize, files: &'a mut Vec<PathBuf>) -> WalkFuture<'a> {
        Box::pin(async move {
            let mut read_dir = fs::read_dir(dir).await?;

            while let Some(entry) = read_dir.next_entry().await? {
                let entry_path = entry.path();
                if !self.follow_symlinks && entry_path.is_symlink() {
                    continue;
                }

                let metadata = match fs::metadata(&entry_path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %entry_path.display(), error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_file() {
                    if self.should_process(&entry_path) {
                        files.push(entry_path);
                    }
                } else if metadata.is_dir() && self.max_depth.is_none_or(|max| depth < max) {
                    if let Err(e) = self.walk(&entry_path, depth + 1, files).await {
                        warn!(path = %entry_path.display(), error = %e, "Skipping directory");
                    }
                }
            }

            Ok(())
        })
    }

    /// Extension, exclude and include checks, in that order
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(path),
            None => true,
        }
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| XmlToolingError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }

    let set = builder
        .build()
        .map_err(|e| XmlToolingError::Config(format!("Failed to build glob set: {}", e)))?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn create_test_directory() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("soap")).await.unwrap();
        fs::create_dir_all(root.join("archive/2024")).await.unwrap();

        let envelope = r#"<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/"><soap11:Body/></soap11:Envelope>"#;
        fs::write(root.join("request.xml"), envelope).await.unwrap();
        fs::write(root.join("response.XML"), envelope).await.unwrap();
        fs::write(root.join("notes.txt"), "text file").await.unwrap();
        fs::write(root.join("soap/fault.xml"), envelope).await.unwrap();
        fs::write(root.join("archive/2024/old.xml"), envelope).await.unwrap();
        fs::write(root.join("archive/2024/assertion.saml"), "<a/>").await.unwrap();

        temp_dir
    }

    fn names(files: &[PathBuf]) -> HashSet<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_discover_xml_files() {
        let temp_dir = create_test_directory().await;
        let files = FileDiscovery::new().discover_files(temp_dir.path()).await.unwrap();

        let found = names(&files);
        assert_eq!(files.len(), 4);
        assert!(found.contains("response.XML"));
        assert!(found.contains("old.xml"));
        assert!(!found.contains("notes.txt"));

        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[tokio::test]
    async fn test_multiple_extensions() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new().with_extensions(vec!["xml".to_string(), ".SAML".to_string()]);

        let files = discovery.discover_files(temp_dir.path()).await.unwrap();
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn test_max_depth_limit() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new().with_max_depth(Some(1));

        let found = names(&discovery.discover_files(temp_dir.path()).await.unwrap());
        assert_eq!(found.len(), 3);
        assert!(found.contains("fault.xml"));
        assert!(!found.contains("old.xml"));
    }

    #[tokio::test]
    async fn test_include_and_exclude_patterns() {
        let temp_dir = create_test_directory().await;

        let discovery = FileDiscovery::new()
            .with_include_patterns(&["**/soap/*".to_string()])
            .unwrap();
        let found = names(&discovery.discover_files(temp_dir.path()).await.unwrap());
        assert_eq!(found, HashSet::from(["fault.xml".to_string()]));

        let discovery = FileDiscovery::new()
            .with_exclude_patterns(&["**/archive/**".to_string()])
            .unwrap();
        let found = names(&discovery.discover_files(temp_dir.path()).await.unwrap());
        assert_eq!(found.len(), 3);
        assert!(!found.contains("old.xml"));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let result = FileDiscovery::new().with_include_patterns(&["a[".to_string()]);
        assert!(matches!(result, Err(XmlToolingError::Config(msg)) if msg.contains("a[")));
    }

    #[test]
    fn test_from_config() {
        let config = FileConfig {
            extensions: vec!["saml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec!["*.bak.saml".to_string()],
        };
        let discovery = FileDiscovery::from_config(&config).unwrap();

        assert!(discovery.should_process(Path::new("assertion.saml")));
        assert!(!discovery.should_process(Path::new("assertion.bak.saml")));
        assert!(!discovery.should_process(Path::new("assertion.xml")));
        assert!(!discovery.should_process(Path::new("assertion")));
    }

    #[tokio::test]
    async fn test_single_file_argument() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new();

        let files = discovery.discover_files(&temp_dir.path().join("request.xml")).await.unwrap();
        assert_eq!(files.len(), 1);

        let files = discovery.discover_files(&temp_dir.path().join("notes.txt")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_nonexistent_directory() {
        let result = FileDiscovery::new().discover_files(Path::new("/nonexistent/path")).await;
        assert!(matches!(result, Err(XmlToolingError::Io(_))));
    }
}
