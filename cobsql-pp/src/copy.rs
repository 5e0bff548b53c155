use std::path::{Path, PathBuf};

use log::debug;

/// Resolves copybook names to files across an ordered search path.
///
/// For each directory (starting directory first) every configured extension
/// is probed in order; the empty extension means "no extension". Extension
/// matching is case-insensitive: each candidate is tried as configured, then
/// lower-cased, then upper-cased. First hit wins. The resolver is pure — no
/// caching, nothing beyond a filesystem stat.
#[derive(Debug)]
pub struct CopyResolver {
    base_dir: PathBuf,
    search_dirs: Vec<PathBuf>,
    extensions: Vec<String>,
    verbose: bool,
}

impl CopyResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> CopyResolver {
        CopyResolver {
            base_dir: base_dir.into(),
            search_dirs: Vec::new(),
            extensions: vec![String::new(), "cpy".to_string()],
            verbose: false,
        }
    }

    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        self.search_dirs.push(dir.into());
    }

    pub fn set_extensions(&mut self, exts: Vec<String>) {
        // the bare name is always probed first
        let mut extensions = vec![String::new()];
        extensions.extend(exts.into_iter().filter(|e| !e.is_empty()));
        self.extensions = extensions;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let dirs = std::iter::once(&self.base_dir).chain(self.search_dirs.iter());
        for dir in dirs {
            for ext in &self.extensions {
                for candidate in Self::ext_candidates(ext) {
                    let path = if candidate.is_empty() {
                        dir.join(name)
                    } else {
                        dir.join(format!("{name}.{candidate}"))
                    };
                    if path.is_file() {
                        if self.verbose {
                            debug!("copybook {} resolved to {}", name, path.display());
                        }
                        return Some(Self::absolute(&path));
                    }
                }
            }
        }
        None
    }

    fn ext_candidates(ext: &str) -> Vec<String> {
        let mut out = vec![ext.to_string()];
        let lower = ext.to_lowercase();
        let upper = ext.to_uppercase();
        if !out.contains(&lower) {
            out.push(lower);
        }
        if !out.contains(&upper) {
            out.push(upper);
        }
        out
    }

    fn absolute(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_directory_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("FOO.cpy"), "from first").unwrap();
        fs::write(second.join("FOO.cpy"), "from second").unwrap();

        let mut resolver = CopyResolver::new(tmp.path());
        resolver.add_search_dir(&first);
        resolver.add_search_dir(&second);

        let hit = resolver.resolve("FOO").unwrap();
        assert_eq!(fs::read_to_string(hit).unwrap(), "from first");
    }

    #[test]
    fn test_extension_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("BAR.CPY"), "x").unwrap();

        let resolver = CopyResolver::new(tmp.path());
        assert!(resolver.resolve("BAR").is_some());
    }

    #[test]
    fn test_bare_name_probed_first() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("BAZ"), "bare").unwrap();
        fs::write(tmp.path().join("BAZ.cpy"), "ext").unwrap();

        let resolver = CopyResolver::new(tmp.path());
        let hit = resolver.resolve("BAZ").unwrap();
        assert_eq!(fs::read_to_string(hit).unwrap(), "bare");
    }

    #[test]
    fn test_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = CopyResolver::new(tmp.path());
        assert!(resolver.resolve("MISSING").is_none());
    }
}
