//! Shared fixtures for the integration tests.
//!
//! Sessions run against a real [`DirectoryAssetStore`] in a temp directory
//! so that renames, sidecars and deletions hit the filesystem.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;

use monomorph::prelude::*;
use tempfile::TempDir;

/// Writes a small text artifact describing the request.
///
/// Can be switched into a failing mode to simulate a broken generator.
#[derive(Default)]
pub struct TextGenerator {
    failing: Cell<bool>,
    calls: Cell<usize>,
}

impl TextGenerator {
    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ArtifactGenerator for TextGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> std::result::Result<Vec<u8>, ArtifactError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.get() {
            return Err(ArtifactError::Generation {
                name: request.name.to_string(),
                message: "generator offline".to_string(),
            });
        }
        let args: Vec<String> = request.arguments.iter().map(|a| a.name.to_string()).collect();
        Ok(format!(
            "{:?} {} <{}> {:016x}\n",
            request.kind,
            request.template.identity.name,
            args.join(", "),
            request.fingerprint.as_u64()
        )
        .into_bytes())
    }
}

pub type TestSession<S> = Session<DeclarationSet, TextGenerator, DirectoryAssetStore, S>;

/// A temp workspace holding the generated asset directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn assets(&self) -> std::path::PathBuf {
        self.dir.path().join("Generated")
    }

    pub fn registry_file(&self) -> std::path::PathBuf {
        self.dir.path().join("Library").join("registry.json")
    }

    pub fn asset_exists(&self, name: &str) -> bool {
        self.assets().join(format!("{name}.asset")).is_file()
    }

    pub fn sidecar_exists(&self, name: &str) -> bool {
        self.assets().join(format!("{name}.asset.meta")).is_file()
    }

    pub fn remove_asset(&self, name: &str) {
        std::fs::remove_file(self.assets().join(format!("{name}.asset"))).expect("remove asset");
    }

    pub fn session<S: SnapshotStore>(&self, source: DeclarationSet, store: S) -> TestSession<S> {
        let importer = open_assets(&self.assets());
        Session::new(MonomorphConfig::default(), source, TextGenerator::default(), importer, store)
    }

    pub fn configured_session(
        &self,
        source: DeclarationSet,
        config: MonomorphConfig,
    ) -> TestSession<MemoryStore> {
        let importer = open_assets(&self.assets());
        Session::new(config, source, TextGenerator::default(), importer, MemoryStore::new())
    }

    pub fn memory_session(&self, source: DeclarationSet) -> TestSession<MemoryStore> {
        self.session(source, MemoryStore::new())
    }

    pub fn json_session(&self, source: DeclarationSet) -> TestSession<JsonFileStore> {
        self.session(source, JsonFileStore::new(self.registry_file()))
    }
}

pub fn open_assets(path: &Path) -> DirectoryAssetStore {
    DirectoryAssetStore::open(path, "asset").expect("open asset dir")
}

/// `Box<T>` component template plus `Int` and `Foo` concrete types.
pub fn box_world() -> DeclarationSet {
    let mut set = DeclarationSet::new();
    set.add_template(TemplateKind::Component, box_identity(), &["T"])
        .add_type(int())
        .add_type(foo());
    set
}

pub fn box_identity() -> TypeIdentity {
    TypeIdentity::new("g-box", "Box`1")
}

pub fn int() -> TypeIdentity {
    TypeIdentity::new("t-int", "Int")
}

pub fn foo() -> TypeIdentity {
    TypeIdentity::new("t-foo", "Foo")
}

/// Component templates declared in order, no concrete types.
pub fn components(identities: &[TypeIdentity]) -> DeclarationSet {
    let mut set = DeclarationSet::new();
    for identity in identities {
        set.add_template(TemplateKind::Component, identity.clone(), &["T"]);
    }
    set
}

pub fn selector<S: SnapshotStore>(session: &TestSession<S>, name: &str) -> ArtifactId {
    session
        .lookup()
        .expect("reconciled")
        .selector(&qn(name))
        .cloned()
        .expect("selector")
}

pub const POLICIES: [MatchPolicy; 3] = [
    MatchPolicy::FirstMatch,
    MatchPolicy::IdentityFirst,
    MatchPolicy::RequireUnique,
];

pub fn qn(name: &str) -> QualifiedName {
    QualifiedName::from(name)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
