use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AttachmentError;

const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";
const PDF_MAGIC: &[u8] = b"%PDF";

/// Decode a PDF embedded as a base64 data URL
///
/// Submissions carry their document inline, the way a browser `FileReader`
/// produces it: `data:application/pdf;base64,<payload>`.
///
/// # Arguments
/// * `data_url` - The encoded document
///
/// # Returns
/// * `Result<Vec<u8>, AttachmentError>` - The raw PDF bytes
///
/// # Errors
/// * `NotPdfDataUrl` if the value is not a base64 `application/pdf` data URL
/// * `Base64` if the payload cannot be decoded
/// * `MissingPdfHeader` if the decoded bytes do not start with `%PDF`
pub fn decode_pdf_data_url(data_url: &str) -> Result<Vec<u8>, AttachmentError> {
    let payload = data_url
        .trim()
        .strip_prefix(PDF_DATA_URL_PREFIX)
        .ok_or(AttachmentError::NotPdfDataUrl)?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AttachmentError::Base64(e.to_string()))?;

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AttachmentError::MissingPdfHeader);
    }
    Ok(bytes)
}

/// Encode raw PDF bytes as a data URL.
pub fn encode_pdf_data_url(bytes: &[u8]) -> String {
    format!("{}{}", PDF_DATA_URL_PREFIX, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_pdf() {
        let url = encode_pdf_data_url(b"%PDF-1.4\n%%EOF");
        assert!(url.starts_with("data:application/pdf;base64,"));
        assert_eq!(decode_pdf_data_url(&url).unwrap(), b"%PDF-1.4\n%%EOF");
    }

    #[test]
    fn test_rejects_other_media_types() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"%PDF-1.4"));
        assert_eq!(decode_pdf_data_url(&url), Err(AttachmentError::NotPdfDataUrl));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            decode_pdf_data_url("data:application/pdf;base64,***"),
            Err(AttachmentError::Base64(_))
        ));
        let not_pdf = encode_pdf_data_url(b"hello world");
        assert_eq!(
            decode_pdf_data_url(&not_pdf),
            Err(AttachmentError::MissingPdfHeader)
        );
    }
}
