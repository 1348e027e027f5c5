//! Model type classification from file paths.
//!
//! Classification is a pure function of the path text and the configured
//! roots. The on-disk folder layout is authoritative: a file under
//! `<root>/lora/...` is a LoRA no matter what its name says. Keyword and
//! extension heuristics only apply to files outside every root.

use crate::paths::{comparison_key, is_within, normalize_lexically, segments_below, slash_lower};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Classification values that exist as pre-seeded, undeletable tags.
pub const SYSTEM_TYPES: &[&str] = &[
    "checkpoint",
    "lora",
    "embedding",
    "vae",
    "upscale",
    "ultralytics",
    "other",
];

/// Fallback classification.
pub const OTHER_TYPE: &str = "other";

/// Path keyword families, checked in order. A family matches when one of its
/// words appears as a whole `/word/` segment.
const KEYWORDS: &[(&str, &[&str])] = &[
    ("embedding", &["embedding", "embeddings"]),
    ("lora", &["lora", "loras"]),
    ("vae", &["vae", "vaes"]),
    ("controlnet", &["controlnet", "control_nets"]),
    ("upscale", &["upscale", "esrgan", "realesr"]),
    ("ultralytics", &["ultralytics"]),
    (
        "checkpoint",
        &["checkpoint", "checkpoints", "stable-diffusion", "sd", "sdxl"],
    ),
];

/// Segment that always means "not a generation model" (segment-anything weights).
const SAMS_SEGMENT: &str = "/sams/";

/// Extension fallback, first match wins.
const EXTENSION_TYPES: &[(&str, &[&str])] = &[
    ("checkpoint", &["ckpt", "safetensors", "pth"]),
    ("embedding", &["pt", "bin"]),
];

/// Whether `name` is one of the pre-seeded classification values.
pub fn is_system_type(name: &str) -> bool {
    SYSTEM_TYPES.contains(&name)
}

/// A configured directory root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoot {
    pub path: PathBuf,
    /// Set when the root's own directory name is a known type, e.g. a root
    /// configured as `.../models/lora`.
    pub mapped_type: Option<String>,
}

impl ModelRoot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = normalize_lexically(path.as_ref());
        let mapped_type = path
            .file_name()
            .map(|n| n.to_string_lossy().trim().to_lowercase())
            .filter(|n| is_system_type(n));
        Self { path, mapped_type }
    }
}

/// The configured roots, ordered from most to least specific.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSet {
    roots: Vec<ModelRoot>,
}

impl RootSet {
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut roots: Vec<ModelRoot> = paths.iter().map(ModelRoot::new).collect();
        roots.sort_by(|a, b| {
            let (ka, kb) = (comparison_key(&a.path), comparison_key(&b.path));
            kb.len().cmp(&ka.len()).then_with(|| ka.cmp(&kb))
        });
        roots.dedup_by(|a, b| comparison_key(&a.path) == comparison_key(&b.path));
        Self { roots }
    }

    pub fn roots(&self) -> &[ModelRoot] {
        &self.roots
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| r.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The most specific (longest) root containing `path`.
    pub fn find(&self, path: &Path) -> Option<&ModelRoot> {
        self.roots.iter().find(|r| is_within(path, &r.path))
    }
}

/// Classify a model file.
///
/// Order, first match wins:
/// 1. the most specific containing root is itself mapped to a type;
/// 2. the first directory below that root, lower-cased;
/// 3. keyword heuristics, then the extension table, then `other`.
///
/// A file lying directly in an unmapped root has no type directory and falls
/// through to step 3.
pub fn classify(path: &Path, roots: &RootSet) -> String {
    let path = normalize_lexically(path);
    if let Some(root) = roots.find(&path) {
        if let Some(mapped) = &root.mapped_type {
            return mapped.clone();
        }
        if let Some(segments) = segments_below(&path, &root.path) {
            if segments.len() >= 2 {
                let first = segments[0].trim().to_lowercase();
                if !first.is_empty() {
                    return first;
                }
            }
        }
    }
    classify_by_heuristics(&path)
}

/// Keyword and extension heuristics for paths outside every root.
pub fn classify_by_heuristics(path: &Path) -> String {
    let text = slash_lower(path);
    if text.contains(SAMS_SEGMENT) {
        return OTHER_TYPE.to_string();
    }

    for (model_type, words) in KEYWORDS {
        if words.iter().any(|w| text.contains(&format!("/{w}/"))) {
            return (*model_type).to_string();
        }
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    EXTENSION_TYPES
        .iter()
        .find(|(_, exts)| exts.contains(&extension.as_str()))
        .map(|(t, _)| (*t).to_string())
        .unwrap_or_else(|| OTHER_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots(paths: &[&str]) -> RootSet {
        RootSet::new(&paths.iter().map(PathBuf::from).collect::<Vec<_>>())
    }

    #[cfg(unix)]
    #[test]
    fn test_first_segment_under_root() {
        let set = roots(&["/roots"]);
        assert_eq!(classify(Path::new("/roots/lora/x.safetensors"), &set), "lora");
        assert_eq!(
            classify(Path::new("/roots/Upscale_Models/4x.pth"), &set),
            "upscale_models"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_is_deterministic() {
        let set = roots(&["/roots"]);
        let path = Path::new("/roots/lora/sub/x.safetensors");
        let first = classify(path, &set);
        for _ in 0..10 {
            assert_eq!(classify(path, &set), first);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mapped_root_wins() {
        let set = roots(&["/data/vae"]);
        assert_eq!(classify(Path::new("/data/vae/sdxl/model.safetensors"), &set), "vae");
        assert_eq!(classify(Path::new("/data/vae/model.safetensors"), &set), "vae");
    }

    #[cfg(unix)]
    #[test]
    fn test_nested_roots_prefer_longest() {
        let set = roots(&["/models", "/models/extra"]);
        assert_eq!(
            classify(Path::new("/models/extra/lora/x.safetensors"), &set),
            "lora"
        );
        assert_eq!(
            classify(Path::new("/models/checkpoints/x.ckpt"), &set),
            "checkpoints"
        );

        let mapped = roots(&["/models", "/models/embedding"]);
        assert_eq!(
            classify(Path::new("/models/embedding/foo/x.pt"), &mapped),
            "embedding"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_directly_in_root_uses_heuristics() {
        let set = roots(&["/models"]);
        assert_eq!(classify(Path::new("/models/x.ckpt"), &set), "checkpoint");
        assert_eq!(classify(Path::new("/models/x.pt"), &set), "embedding");
    }

    #[test]
    fn test_keyword_heuristics() {
        let empty = RootSet::default();
        assert_eq!(classify(Path::new("/x/loras/a.safetensors"), &empty), "lora");
        assert_eq!(classify(Path::new("/x/embeddings/a.pt"), &empty), "embedding");
        assert_eq!(classify(Path::new("/x/esrgan/a.pth"), &empty), "upscale");
        assert_eq!(classify(Path::new("/x/sdxl/a.safetensors"), &empty), "checkpoint");
        assert_eq!(
            classify(Path::new("C:\\stuff\\VAE\\a.safetensors"), &empty),
            "vae"
        );
    }

    #[test]
    fn test_sams_segment_is_other() {
        let empty = RootSet::default();
        assert_eq!(classify(Path::new("/x/sams/lora/a.pth"), &empty), "other");
    }

    #[test]
    fn test_extension_fallback() {
        let empty = RootSet::default();
        assert_eq!(classify(Path::new("/x/a.safetensors"), &empty), "checkpoint");
        assert_eq!(classify(Path::new("/x/a.BIN"), &empty), "embedding");
        assert_eq!(classify(Path::new("/x/a.onnx"), &empty), "other");
    }

    #[test]
    fn test_mapped_type_detection() {
        assert_eq!(
            ModelRoot::new("/m/lora").mapped_type.as_deref(),
            Some("lora")
        );
        assert_eq!(ModelRoot::new("/m/models").mapped_type, None);
    }
}
