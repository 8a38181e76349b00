use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, trace};
use walkdir::WalkDir;

/// Recursively collect `*.pdf` files (case-insensitive) under `root`,
/// skipping anything matching one of the glob ignore patterns. Unreadable
/// subdirectories are logged and skipped. Results are sorted.
pub fn discover_pdfs(root: &Path, ignore_globs: &[String]) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Error reading directory {}: not a directory", root.display()),
        ));
    }

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let mut pdfs = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(entry.path()))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error walking {}: {}", root.display(), err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_pdf(entry.path()) {
            trace!("Found file: {}", entry.path().display());
            pdfs.push(entry.into_path());
        }
    }

    pdfs.sort();
    Ok(pdfs)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_pdfs_recursive_and_case_insensitive() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("one.pdf"), b"%PDF").unwrap();
        fs::write(nested.join("TWO.PDF"), b"%PDF").unwrap();
        fs::write(nested.join("notes.txt"), b"text").unwrap();

        let found = discover_pdfs(tmp.path(), &[]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("one.pdf")));
        assert!(found.iter().any(|p| p.ends_with("TWO.PDF")));
    }

    #[test]
    fn test_discover_pdfs_honours_ignore_patterns() {
        let tmp = tempdir().unwrap();
        let skipped = tmp.path().join("skip");
        fs::create_dir_all(&skipped).unwrap();
        fs::write(tmp.path().join("keep.pdf"), b"%PDF").unwrap();
        fs::write(skipped.join("drop.pdf"), b"%PDF").unwrap();

        let pattern = format!("{}/skip", tmp.path().display());
        let found = discover_pdfs(tmp.path(), &[pattern]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("keep.pdf"));
    }

    #[test]
    fn test_discover_pdfs_missing_root() {
        let tmp = tempdir().unwrap();
        assert!(discover_pdfs(&tmp.path().join("missing"), &[]).is_err());
    }
}
