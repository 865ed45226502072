use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Unpacks a Function's source archive, builds a container image, and pushes
/// it to a registry (spec.md §4.1 "Function create"). Kept behind a narrow
/// trait like the other backend seams in this workspace; the simulated
/// implementation derives a deterministic image reference from the archive's
/// content hash the same way the teacher's `libs/oauth2/src/image.rs`
/// fingerprints downloaded image bytes.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build_and_push(&self, function_name: &str, archive: &[u8]) -> Result<String, String>;
}

/// Maximum source archive size accepted for a build, mirroring the teacher's
/// `MAX_IMAGE_SIZE` guard on downloaded image bytes.
pub const MAX_ARCHIVE_SIZE: usize = 64 * 1024 * 1024;

pub struct SimulatedImageBuilder {
    registry: String,
}

impl SimulatedImageBuilder {
    pub fn new(registry: impl Into<String>) -> Self {
        Self { registry: registry.into() }
    }
}

#[async_trait]
impl ImageBuilder for SimulatedImageBuilder {
    async fn build_and_push(&self, function_name: &str, archive: &[u8]) -> Result<String, String> {
        if archive.is_empty() {
            return Err("source archive is empty".to_string());
        }
        if archive.len() > MAX_ARCHIVE_SIZE {
            return Err(format!(
                "source archive size {} exceeds maximum allowed size {MAX_ARCHIVE_SIZE} bytes",
                archive.len()
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(archive);
        let digest = format!("{:x}", hasher.finalize());
        let tag = &digest[..12];
        let image = format!("{}/{function_name}:{tag}", self.registry);

        tracing::info!(
            %image,
            archive_bytes = archive.len(),
            "simulated archive unpack, image build, and registry push"
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_archive_produces_the_same_image_reference() {
        let builder = SimulatedImageBuilder::new("registry.flotilla.internal");
        let a = builder.build_and_push("resize-image", b"source bytes").await.unwrap();
        let b = builder.build_and_push("resize-image", b"source bytes").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_archives_produce_different_tags() {
        let builder = SimulatedImageBuilder::new("registry.flotilla.internal");
        let a = builder.build_and_push("resize-image", b"one").await.unwrap();
        let b = builder.build_and_push("resize-image", b"two").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_archive_is_rejected() {
        let builder = SimulatedImageBuilder::new("registry.flotilla.internal");
        assert!(builder.build_and_push("resize-image", b"").await.is_err());
    }
}
