use image::ImageFormat;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];
pub const DEFAULT_MAX_FILE_BYTES: usize = 16 * 1024 * 1024;

/// A file taken from the `image` multipart field.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No se proporcionó archivo")]
    Missing,
    #[error("Archivo sin extensión")]
    NoExtension,
    #[error("Extensión no permitida: {0}")]
    ExtensionNotAllowed(String),
    #[error("Archivo demasiado grande")]
    TooLarge,
    #[error("El contenido no coincide con la extensión: {0}")]
    ContentMismatch(String),
}

#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_file_bytes: usize,
    verify_content: bool,
}

impl Default for ImageValidator {
    fn default() -> Self {
        ImageValidator::new(DEFAULT_MAX_FILE_BYTES, false)
    }
}

impl ImageValidator {
    pub fn new(max_file_bytes: usize, verify_content: bool) -> Self {
        ImageValidator {
            max_file_bytes,
            verify_content,
        }
    }

    /// Checks presence, extension and size, in that order. The content is only
    /// sniffed when `verify_content` is enabled.
    pub fn validate(&self, file: Option<&UploadedImage>) -> Result<(), ValidationError> {
        let file = match file {
            Some(file) if !file.filename.is_empty() => file,
            _ => return Err(ValidationError::Missing),
        };

        let (_, extension) = file
            .filename
            .rsplit_once('.')
            .ok_or(ValidationError::NoExtension)?;
        let extension = extension.to_lowercase();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::ExtensionNotAllowed(extension));
        }

        if file.bytes.len() > self.max_file_bytes {
            return Err(ValidationError::TooLarge);
        }

        if self.verify_content {
            let declared = ImageFormat::from_extension(&extension);
            let sniffed = image::guess_format(&file.bytes).ok();
            if sniffed.is_none() || sniffed != declared {
                return Err(ValidationError::ContentMismatch(extension));
            }
        }

        Ok(())
    }
}

/// Reduces a client-supplied filename to a safe basename: path components are
/// dropped, whitespace becomes `_`, and anything outside ASCII letters, digits
/// and `.-_` is removed before `.` and `_` are trimmed from both ends.
///
/// Non-ASCII letters are dropped, not transliterated: `ñ` disappears rather
/// than becoming `n`.
pub fn secure_filename(name: &str) -> String {
    let basename = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = basename
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let trimmed = cleaned.trim_matches(['.', '_']);
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};

    use super::*;

    fn upload(name: &str, len: usize) -> UploadedImage {
        UploadedImage {
            filename: name.to_string(),
            bytes: vec![0; len],
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(2, 2, Rgb([1, 2, 3])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn rejects_missing_file() {
        let validator = ImageValidator::default();
        assert_eq!(validator.validate(None), Err(ValidationError::Missing));
        assert_eq!(validator.validate(Some(&upload("", 10))), Err(ValidationError::Missing));
    }

    #[test]
    fn rejects_in_priority_order() {
        let validator = ImageValidator::default();
        let huge = DEFAULT_MAX_FILE_BYTES + 1;

        assert_eq!(
            validator.validate(Some(&upload("leaf", huge))),
            Err(ValidationError::NoExtension)
        );
        assert_eq!(
            validator.validate(Some(&upload("malware.exe", huge))),
            Err(ValidationError::ExtensionNotAllowed("exe".to_string()))
        );
        assert_eq!(
            validator.validate(Some(&upload("leaf.png", huge))),
            Err(ValidationError::TooLarge)
        );
    }

    #[test]
    fn extension_message_cites_extension() {
        let err = ImageValidator::default()
            .validate(Some(&upload("malware.exe", 10)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Extensión no permitida: exe");
    }

    #[test]
    fn accepts_allowed_extensions_without_reading_content() {
        let validator = ImageValidator::default();
        for name in ["a.png", "b.JPG", "c.jpeg", "d.gif", "e.Bmp", "archive.tar.png"] {
            assert_eq!(validator.validate(Some(&upload(name, 100))), Ok(()), "{name}");
        }
        assert_eq!(
            validator.validate(Some(&upload("exact.jpg", DEFAULT_MAX_FILE_BYTES))),
            Ok(())
        );
    }

    #[test]
    fn trailing_dot_is_an_empty_extension() {
        assert_eq!(
            ImageValidator::default().validate(Some(&upload("leaf.", 1))),
            Err(ValidationError::ExtensionNotAllowed(String::new()))
        );
    }

    #[test]
    fn content_check_catches_spoofed_extension() {
        let validator = ImageValidator::new(DEFAULT_MAX_FILE_BYTES, true);
        let png = png_bytes();

        let real = UploadedImage {
            filename: "leaf.png".to_string(),
            bytes: png.clone(),
        };
        assert_eq!(validator.validate(Some(&real)), Ok(()));

        let renamed = UploadedImage {
            filename: "leaf.jpg".to_string(),
            bytes: png,
        };
        assert_eq!(
            validator.validate(Some(&renamed)),
            Err(ValidationError::ContentMismatch("jpg".to_string()))
        );

        assert_eq!(
            validator.validate(Some(&upload("zeros.gif", 64))),
            Err(ValidationError::ContentMismatch("gif".to_string()))
        );
    }

    #[test]
    fn secure_filename_strips_paths_and_symbols() {
        assert_eq!(secure_filename("leaf.jpg"), "leaf.jpg");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\hoja 1.png"), "hoja_1.png");
        assert_eq!(secure_filename("..hidden.png"), "hidden.png");
        assert_eq!(secure_filename("../"), "upload");
        assert_eq!(secure_filename(""), "upload");
    }

    #[test]
    fn secure_filename_trims_dots_and_underscores_at_both_ends() {
        assert_eq!(secure_filename("hoja_.png_"), "hoja_.png");
        assert_eq!(secure_filename("__hoja.png__"), "hoja.png");
        assert_eq!(secure_filename("hoja.png."), "hoja.png");
        assert_eq!(secure_filename("._."), "upload");
    }

    #[test]
    fn secure_filename_drops_non_ascii_letters() {
        assert_eq!(secure_filename("tomate_ñ.png"), "tomate_.png");
        assert_eq!(secure_filename("papá maíz.jpg"), "pap_maz.jpg");
        assert_eq!(secure_filename("ñ"), "upload");
    }
}
