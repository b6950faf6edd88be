//! On-disk project fixtures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::project::{ProjectManifest, MANIFEST_NAME};

/// Manifest of the standard fixture: one library, one app, one sample and a
/// config directory.
pub const STANDARD_MANIFEST: &str = r#"[project]
name = "greeter"
version = "0.3.0"

[defines]
GREETING = "hello"

[[library]]
name = "greet"
sources = "src/greet"
includes = "include"

[[app]]
name = "greeter"
sources = "src/app"

[[sample]]
name = "hello"
sources = "samples/hello"

[configs]
dir = "etc"
patterns = ["*.conf"]
"#;

/// A project written into a temporary directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create a project with the given manifest and no other files.
    pub fn new(manifest: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fixture = ProjectFixture { dir };
        fixture.write(MANIFEST_NAME, manifest);
        fixture
    }

    /// The standard greeter project.
    pub fn standard() -> Self {
        let fixture = ProjectFixture::new(STANDARD_MANIFEST);
        fixture.write("include/greet/greet.h", minimal_header("greet"));
        fixture.write("src/greet/greet.cpp", "#include \"greet/greet.h\"\nint greet() { return 0; }\n");
        fixture.write("src/greet/detail/format.c", "int format_name(void) { return 1; }\n");
        fixture.write("src/app/main.cpp", "int main() { return 0; }\n");
        fixture.write("samples/hello/hello.cpp", "int main() { return 0; }\n");
        fixture.write("etc/greeter.conf", "greeting = hello\n");
        fixture.write("etc/locales/en.conf", "lang = en\n");
        fixture.write("etc/README", "not installed\n");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join(MANIFEST_NAME)
    }

    /// Parse the fixture's manifest.
    pub fn manifest(&self) -> ProjectManifest {
        ProjectManifest::load(&self.manifest_path()).expect("fixture manifest is valid")
    }

    /// Write a file relative to the project root.
    pub fn write(&self, rel: impl AsRef<Path>, contents: impl AsRef<str>) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        std::fs::write(&path, contents.as_ref()).expect("failed to write fixture file");
    }
}

/// A header with an include guard.
pub fn minimal_header(name: &str) -> String {
    let guard = name.to_uppercase().replace('-', "_");
    format!(
        r#"#ifndef {guard}_H
#define {guard}_H

int {name}(void);

#endif // {guard}_H
"#
    )
}
