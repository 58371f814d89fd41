//! GPU Bridge (C7): hands a produced preview's pixels to a platform
//! texture-upload backend. No real backend ships in this crate — the
//! platform bridges (Metal, Vulkan) are native surfaces this library does
//! not own; only the stub is implemented here, mirroring the original
//! implementation's `GpuBridge` interface and `GpuBridgeFactory`.

use super::types::PreviewImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Metal,
    Vulkan,
    Stub,
}

impl Backend {
    /// The label attached to a `CacheEvent`'s `backend` field: `"Metal"`,
    /// `"Stub"`, or the platform default string otherwise.
    pub fn event_label(&self) -> &'static str {
        match self {
            Backend::Metal => "Metal",
            Backend::Vulkan => "Vulkan",
            Backend::Stub => "Stub",
        }
    }
}

/// Uploads a decoded preview's pixels to a GPU-resident texture.
/// Implementations report success/failure rather than returning a
/// `Result` — upload failure is a degraded path recorded on the
/// resulting `CacheEvent`, not a propagated error.
pub trait GpuBridge: Send + Sync {
    fn upload(&self, image: &PreviewImage) -> (bool, String);
    fn backend(&self) -> Backend;

    fn texture_debug_label(&self) -> String {
        String::new()
    }
}

/// Always-fails bridge used where no native backend is available.
pub struct StubGpuBridge;

impl GpuBridge for StubGpuBridge {
    fn upload(&self, _image: &PreviewImage) -> (bool, String) {
        (false, "GPU backend unavailable on this platform.".to_string())
    }

    fn backend(&self) -> Backend {
        Backend::Stub
    }
}

/// Selects a bridge for the current platform. This build carries no
/// native Metal/Vulkan implementation, so it always returns the stub;
/// the factory seam exists so a future native bridge slots in without
/// callers changing.
pub fn create_bridge() -> Box<dyn GpuBridge> {
    Box::new(StubGpuBridge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> PreviewImage {
        PreviewImage {
            cache_key: "a#1".to_string(),
            source_path: "a.jpg".into(),
            pixels: vec![1, 2, 3],
            width: 512,
            height: 256,
            color_managed: false,
            color_profile: String::new(),
        }
    }

    #[test]
    fn stub_always_fails_with_message() {
        let bridge = StubGpuBridge;
        let (ok, message) = bridge.upload(&sample_image());
        assert!(!ok);
        assert_eq!(message, "GPU backend unavailable on this platform.");
        assert_eq!(bridge.backend(), Backend::Stub);
    }

    #[test]
    fn factory_returns_stub_on_this_platform() {
        let bridge = create_bridge();
        assert_eq!(bridge.backend(), Backend::Stub);
    }
}
