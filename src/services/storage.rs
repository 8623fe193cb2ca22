use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::repository::members::DocumentKind;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredDocument {
    pub key: String,
    pub url: String,
}

/// Uploads an identity document to the configured bucket, keyed by member
/// and kind. The returned URL is what gets written onto the member row.
pub async fn upload_member_document(
    state: &AppState,
    member_id: Uuid,
    kind: DocumentKind,
    file_name: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<StoredDocument, AppError> {
    let bucket = state.config.documents_bucket.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Document storage is not configured. Set DOCUMENTS_BUCKET.".to_string(),
        )
    })?;
    let client = state.s3_client.as_ref().ok_or_else(|| {
        AppError::Dependency("Document storage client is not available.".to_string())
    })?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty.".to_string()));
    }

    let key = format!(
        "{}/{}/{}/{}-{}",
        state.config.documents_key_prefix,
        kind.as_str(),
        member_id,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    );

    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(bytes));
    if let Some(content_type) = content_type {
        request = request.content_type(content_type);
    }

    request.send().await.map_err(|error| {
        tracing::error!(s3_error = %error, "Document upload failed");
        AppError::Dependency("Document upload failed.".to_string())
    })?;

    let url = format!("https://{bucket}.s3.amazonaws.com/{key}");
    Ok(StoredDocument { key, url })
}

fn sanitize_file_name(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || matches!(character, '.' | '-' | '_') {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("aadhar card.pdf"), "aadhar_card.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("   "), "document");
    }
}
