//! Color Transformer (C6): applies a source-ICC -> sRGB transform over
//! pixel bytes.
//!
//! Built on Little CMS via the `lcms2` crate, standing in for the original
//! implementation's direct `<lcms2.h>` usage (`cmsCreate_sRGBProfile`,
//! `cmsOpenProfileFromMem`, `cmsCreateTransform`, `cmsDoTransform`,
//! `cmsGetProfileInfoASCII`).

use lcms2::{InfoType, Intent, Locale, PixelFormat, Profile, Transform, RGB};

/// Holds the target ICC profile (sRGB), built once and retained for the
/// transformer's lifetime.
pub struct ColorTransformer {
    target_profile: Profile,
    target_profile_name: String,
}

impl ColorTransformer {
    pub fn new() -> Self {
        Self {
            target_profile: Profile::new_srgb(),
            target_profile_name: "sRGB IEC61966-2.1".to_string(),
        }
    }

    pub fn target_profile_name(&self) -> &str {
        &self.target_profile_name
    }

    /// Applies the source -> target transform over `pixels`, interpreted
    /// as packed 8-bit RGB triples (trailing bytes beyond a multiple of 3
    /// are ignored). Returns the transformed (or, on any degraded path,
    /// unchanged) pixels plus a label naming the source profile.
    pub fn apply(&self, pixels: &[u8], icc_bytes: &[u8]) -> (Vec<u8>, String) {
        if pixels.is_empty() {
            return (pixels.to_vec(), "Empty".to_string());
        }

        let source_profile = if icc_bytes.is_empty() {
            Profile::new_srgb()
        } else {
            match Profile::new_icc(icc_bytes) {
                Ok(profile) => profile,
                Err(_) => Profile::new_srgb(),
            }
        };

        let pixel_count = pixels.len() / 3;

        let transform: Transform<RGB<u8>, RGB<u8>> = match Transform::new(
            &source_profile,
            PixelFormat::RGB_8,
            &self.target_profile,
            PixelFormat::RGB_8,
            Intent::Perceptual,
        ) {
            Ok(t) => t,
            Err(_) => return (pixels.to_vec(), "TransformFailed".to_string()),
        };

        let src_rgb: Vec<RGB<u8>> = pixels[..pixel_count * 3]
            .chunks_exact(3)
            .map(|c| RGB { r: c[0], g: c[1], b: c[2] })
            .collect();
        let mut dst_rgb = vec![RGB { r: 0u8, g: 0u8, b: 0u8 }; pixel_count];
        transform.transform_pixels(&src_rgb, &mut dst_rgb);

        let mut out = Vec::with_capacity(pixel_count * 3);
        for p in dst_rgb {
            out.push(p.r);
            out.push(p.g);
            out.push(p.b);
        }

        let description = source_profile
            .info(InfoType::Description, &Locale::new("en_US"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Custom ICC Profile".to_string());

        (out, description)
    }
}

impl Default for ColorTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes the displayed profile label the caller attaches to a
/// successfully transformed `PreviewImage`.
pub fn profile_label(source_profile: &str, target_profile: &str) -> String {
    format!("{source_profile} -> {target_profile}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pixels_short_circuit() {
        let transformer = ColorTransformer::new();
        let (pixels, label) = transformer.apply(&[], &[]);
        assert!(pixels.is_empty());
        assert_eq!(label, "Empty");
    }

    #[test]
    fn missing_icc_falls_back_to_srgb_source() {
        let transformer = ColorTransformer::new();
        let input = vec![10u8, 20, 30, 40, 50, 60];
        let (pixels, label) = transformer.apply(&input, &[]);
        assert_eq!(pixels.len(), input.len());
        assert_ne!(label, "Empty");
    }

    #[test]
    fn invalid_icc_bytes_fall_back_to_srgb_source() {
        let transformer = ColorTransformer::new();
        let input = vec![10u8, 20, 30];
        let garbage_icc = vec![0u8, 1, 2, 3];
        let (pixels, _label) = transformer.apply(&input, &garbage_icc);
        assert_eq!(pixels.len(), input.len());
    }

    #[test]
    fn trailing_bytes_beyond_triples_are_ignored() {
        let transformer = ColorTransformer::new();
        let input = vec![1u8, 2, 3, 4, 5]; // 5 bytes -> 1 full RGB triple
        let (pixels, _label) = transformer.apply(&input, &[]);
        assert_eq!(pixels.len(), 3);
    }

    #[test]
    fn profile_label_format() {
        assert_eq!(profile_label("sRGB", "sRGB IEC61966-2.1"), "sRGB -> sRGB IEC61966-2.1");
    }
}
