//! Turning command-line arguments into requests

use genforge_core::{
    ChatMessage, FileMap, Framework, GenerationError, GenerationRequest, ValidationRequest,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files larger than this are left out of the project context
const MAX_FILE_BYTES: u64 = 256 * 1024;

/// Directories never read as project files
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build"];

type Result<T> = std::result::Result<T, GenerationError>;

pub fn generation_request(
    prompt: &str,
    framework: &str,
    history: Option<&Path>,
    files: Option<&Path>,
) -> Result<GenerationRequest> {
    let framework: Framework = framework.parse()?;
    let mut request = GenerationRequest::new(prompt, framework);

    if let Some(path) = history {
        request = request.with_history(read_history(path)?);
    }
    if let Some(dir) = files {
        request = request.with_files(read_project_dir(dir)?);
    }

    request.validate()?;
    Ok(request)
}

pub fn validation_request(framework: &str, paths: &[PathBuf]) -> Result<ValidationRequest> {
    let framework: Framework = framework.parse()?;

    let mut files = FileMap::new();
    for path in paths {
        let content = fs::read_to_string(path).map_err(|e| unreadable(path, e))?;
        files.insert(display_path(path), content);
    }

    let request = ValidationRequest::new(files, framework);
    request.validate()?;
    Ok(request)
}

/// Read a `[{role, content}]` JSON file
fn read_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let raw = fs::read_to_string(path).map_err(|e| unreadable(path, e))?;
    serde_json::from_str(&raw).map_err(|e| {
        GenerationError::InvalidInput(format!("Invalid history file {}: {}", path.display(), e))
    })
}

/// Collect text files under `root`, keyed by `/`-separated relative path
fn read_project_dir(root: &Path) -> Result<FileMap> {
    if !root.is_dir() {
        return Err(GenerationError::InvalidInput(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = FileMap::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| unreadable(&dir, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                if !SKIPPED_DIRS.contains(&name.as_str()) {
                    pending.push(path);
                }
                continue;
            }
            if meta.len() > MAX_FILE_BYTES {
                debug!(path = %path.display(), bytes = meta.len(), "Skipping large file");
                continue;
            }

            match fs::read_to_string(&path) {
                Ok(content) => {
                    let relative = path.strip_prefix(root).unwrap_or(&path);
                    files.insert(display_path(relative), content);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable file"),
            }
        }
    }

    debug!(root = %root.display(), files = files.len(), "Project files loaded");
    Ok(files)
}

fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn unreadable(path: &Path, e: std::io::Error) -> GenerationError {
    GenerationError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_core::{ChatRole, ErrorCategory};
    use tempfile::TempDir;

    #[test]
    fn test_project_dir_skips_hidden_and_vendor() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/react")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("src/components/Button.tsx"), "export {}").unwrap();
        fs::write(dir.path().join("node_modules/react/index.js"), "x").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();

        let files = read_project_dir(dir.path()).unwrap();
        let paths: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["package.json", "src/components/Button.tsx"]);
    }

    #[test]
    fn test_history_file_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[{"role": "user", "content": "Make a counter"}, {"role": "assistant", "content": "Done"}]"#,
        )
        .unwrap();

        let request = generation_request("Add a reset button", "vue", Some(&path), None).unwrap();
        assert_eq!(request.framework, Framework::Vue);
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[1].role, ChatRole::Assistant);
    }

    #[test]
    fn test_bad_inputs_are_invalid() {
        let err = generation_request("Build it", "cobol", None, None).unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedFramework(_)));

        let err = generation_request("Build it", "react", Some(Path::new("/nope.json")), None)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);

        let err = validation_request("react", &[PathBuf::from("/missing.tsx")]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }
}
