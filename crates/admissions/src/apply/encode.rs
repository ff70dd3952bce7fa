use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::form::{DocumentSlot, SelectedFile};
use crate::intake::AttachmentPayload;

#[derive(Debug, thiserror::Error)]
#[error("unable to read {file} for {slot}: {source}")]
pub struct EncodeError {
    pub slot: DocumentSlot,
    pub file: String,
    pub source: std::io::Error,
}

/// Base64-encodes every selected document. Any unreadable file fails the whole batch.
pub fn encode_documents<'a, I>(documents: I) -> Result<Vec<AttachmentPayload>, EncodeError>
where
    I: IntoIterator<Item = (DocumentSlot, &'a SelectedFile)>,
{
    documents
        .into_iter()
        .map(|(slot, file)| {
            let bytes = file.read().map_err(|source| read_error(slot, file, source))?;
            Ok(attachment(slot, file, &bytes))
        })
        .collect()
}

/// Async counterpart of [`encode_documents`] for callers running on a tokio runtime.
pub async fn encode_documents_async<'a, I>(
    documents: I,
) -> Result<Vec<AttachmentPayload>, EncodeError>
where
    I: IntoIterator<Item = (DocumentSlot, &'a SelectedFile)>,
{
    let mut encoded = Vec::new();
    for (slot, file) in documents {
        let bytes = file
            .read_async()
            .await
            .map_err(|source| read_error(slot, file, source))?;
        encoded.push(attachment(slot, file, &bytes));
    }
    Ok(encoded)
}

fn read_error(slot: DocumentSlot, file: &SelectedFile, source: std::io::Error) -> EncodeError {
    EncodeError {
        slot,
        file: file.name.clone(),
        source,
    }
}

fn attachment(slot: DocumentSlot, file: &SelectedFile, bytes: &[u8]) -> AttachmentPayload {
    AttachmentPayload {
        field_name: slot.label().to_string(),
        name: file.name.clone(),
        content_type: Some(file.mime_type.clone()),
        data: BASE64.encode(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_in_given_order_with_slot_labels() {
        let marks = SelectedFile::from_bytes("marks.pdf", "application/pdf", b"marks".to_vec());
        let photo = SelectedFile::from_bytes("me.png", "image/png", b"photo".to_vec());

        let encoded = encode_documents([
            (DocumentSlot::Marksheet, &marks),
            (DocumentSlot::Photo, &photo),
        ])
        .expect("encodes");

        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0].field_name, "10th/12th Marksheet");
        assert_eq!(encoded[0].data, "bWFya3M=");
        assert_eq!(encoded[1].content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn unreadable_file_fails_encoding() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = SelectedFile::from_path(dir.path().join("gone.pdf"), "application/pdf");

        let err = encode_documents([(DocumentSlot::Aadhar, &missing)]).expect_err("read fails");
        assert_eq!(err.slot, DocumentSlot::Aadhar);
        assert_eq!(err.file, "gone.pdf");
    }

    #[tokio::test]
    async fn async_encoding_reads_documents_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("aadhar.pdf");
        std::fs::write(&path, b"scan").expect("write document");
        let aadhar = SelectedFile::from_path(&path, "application/pdf");
        let photo = SelectedFile::from_bytes("me.png", "image/png", b"photo".to_vec());

        let encoded = encode_documents_async([
            (DocumentSlot::Aadhar, &aadhar),
            (DocumentSlot::Photo, &photo),
        ])
        .await
        .expect("encodes");

        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0].name, "aadhar.pdf");
        assert_eq!(encoded[0].data, "c2Nhbg==");
        assert_eq!(encoded[1].field_name, "Passport Size Photo");
    }

    #[tokio::test]
    async fn async_encoding_fails_on_unreadable_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = SelectedFile::from_path(dir.path().join("gone.pdf"), "application/pdf");

        let err = encode_documents_async([(DocumentSlot::Signature, &missing)])
            .await
            .expect_err("read fails");
        assert_eq!(err.slot, DocumentSlot::Signature);
        assert_eq!(err.file, "gone.pdf");
    }
}
