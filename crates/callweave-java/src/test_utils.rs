//! Test utilities for Java fixtures

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Create a temporary repository with a specific file structure
pub fn create_repo_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in structure {
        write_file(temp_dir.path(), path, content);
    }
    temp_dir
}

/// Write `content` to `root/path`, creating parent directories.
pub fn write_file(root: &Path, path: &str, content: &str) {
    let full_path = root.join(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&full_path, content).unwrap();
}

/// A small two-module project: `app` calls into `lib`, and a test class
/// calls into `app`.
pub fn create_sample_project() -> TempDir {
    create_repo_with_structure(&[
        (
            "lib/src/main/java/Repository.java",
            r#"
public class Repository {
    public Repository() {}

    public String load(String key) {
        return normalize(key);
    }

    private String normalize(String key) {
        return key.trim();
    }
}
"#,
        ),
        (
            "app/src/main/java/Service.java",
            r#"
public class Service {
    private final Repository repository = new Repository();

    public String handle(String request) {
        String value = repository.load(request);
        return format(value);
    }

    static String format(String value) {
        return "[" + value + "]";
    }
}
"#,
        ),
        (
            "app/src/test/java/ServiceTest.java",
            r#"
class ServiceTest {
    void handlesRequests() {
        new Service().handle("x");
    }
}
"#,
        ),
    ])
}
