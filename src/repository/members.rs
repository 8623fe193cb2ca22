use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{map_db_error, AppError};
use crate::models::{FlatMember, UserRole};
use crate::schemas::{CreateMemberInput, UpdateMemberInput};

const MEMBER_COLUMNS: &str = "id, flat_id, user_id, full_name, phone_number, email, \
     aadhar_number, pan_number, aadhar_document_url, pan_document_url, \
     other_document_url, is_main_renter, notes, created_at";

pub async fn list_for_flat(pool: &PgPool, flat_id: Uuid) -> Result<Vec<FlatMember>, AppError> {
    sqlx::query_as::<_, FlatMember>(&format!(
        "SELECT {MEMBER_COLUMNS} FROM flat_members
         WHERE flat_id = $1
         ORDER BY is_main_renter DESC, full_name"
    ))
    .bind(flat_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

/// Per-flat member counts across a portfolio; flats with no members are
/// absent from the result.
pub async fn counts_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<(Uuid, i64)>, AppError> {
    sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT m.flat_id, COUNT(*)
         FROM flat_members m
         JOIN flats f ON f.id = m.flat_id
         WHERE f.owner_id = $1
         GROUP BY m.flat_id",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn create(
    pool: &PgPool,
    flat_id: Uuid,
    input: &CreateMemberInput,
) -> Result<FlatMember, AppError> {
    let login_email = if input.is_main_renter {
        Some(input.login_email.as_deref().ok_or_else(|| {
            AppError::BadRequest(
                "A login email is required for the main renter.".to_string(),
            )
        })?)
    } else {
        None
    };

    if input.is_main_renter && main_renter_exists(pool, flat_id, None).await? {
        return Err(AppError::Conflict(
            "This flat already has a main renter.".to_string(),
        ));
    }
    if let Some(field) =
        document_number_taken(pool, &input.aadhar_number, &input.pan_number, None).await?
    {
        return Err(AppError::Conflict(format!(
            "A member with this {field} already exists."
        )));
    }

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    // A main renter carries a login identity, provisioned here; credential
    // issuance against that id belongs to the auth collaborator.
    let user_id = match login_email {
        Some(email) => Some(provision_renter_identity(&mut tx, email, &input.full_name).await?),
        None => None,
    };

    let member = sqlx::query_as::<_, FlatMember>(&format!(
        "INSERT INTO flat_members
            (flat_id, user_id, full_name, phone_number, email,
             aadhar_number, pan_number, is_main_renter, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {MEMBER_COLUMNS}"
    ))
    .bind(flat_id)
    .bind(user_id)
    .bind(&input.full_name)
    .bind(&input.phone_number)
    .bind(&input.email)
    .bind(&input.aadhar_number)
    .bind(&input.pan_number)
    .bind(input.is_main_renter)
    .bind(input.notes.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(map_db_error)?;

    tx.commit().await.map_err(map_db_error)?;
    Ok(member)
}

pub async fn update(
    pool: &PgPool,
    member: &FlatMember,
    input: &UpdateMemberInput,
) -> Result<FlatMember, AppError> {
    let full_name = input.full_name.as_deref().unwrap_or(&member.full_name);
    let phone_number = input
        .phone_number
        .as_deref()
        .unwrap_or(&member.phone_number);
    let email = input.email.as_deref().unwrap_or(&member.email);
    let aadhar_number = input
        .aadhar_number
        .as_deref()
        .unwrap_or(&member.aadhar_number);
    let pan_number = input.pan_number.as_deref().unwrap_or(&member.pan_number);
    let is_main_renter = input.is_main_renter.unwrap_or(member.is_main_renter);
    let notes = input
        .notes
        .as_deref()
        .or(member.notes.as_deref());

    // Exclude the member being edited from the single-main-renter check.
    if is_main_renter && main_renter_exists(pool, member.flat_id, Some(member.id)).await? {
        return Err(AppError::Conflict(
            "This flat already has a main renter.".to_string(),
        ));
    }
    if let Some(field) =
        document_number_taken(pool, aadhar_number, pan_number, Some(member.id)).await?
    {
        return Err(AppError::Conflict(format!(
            "A member with this {field} already exists."
        )));
    }

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let revoked = revoked_identity(member.user_id, is_main_renter);
    let user_id = if is_main_renter {
        match member.user_id {
            Some(existing) => Some(existing),
            None => {
                let login_email = input.login_email.as_deref().ok_or_else(|| {
                    AppError::BadRequest(
                        "A login email is required for the main renter.".to_string(),
                    )
                })?;
                Some(provision_renter_identity(&mut tx, login_email, full_name).await?)
            }
        }
    } else {
        None
    };

    let updated = sqlx::query_as::<_, FlatMember>(&format!(
        "UPDATE flat_members
         SET user_id = $2, full_name = $3, phone_number = $4, email = $5,
             aadhar_number = $6, pan_number = $7, is_main_renter = $8, notes = $9
         WHERE id = $1
         RETURNING {MEMBER_COLUMNS}"
    ))
    .bind(member.id)
    .bind(user_id)
    .bind(full_name)
    .bind(phone_number)
    .bind(email)
    .bind(aadhar_number)
    .bind(pan_number)
    .bind(is_main_renter)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_db_error)?;

    if let Some(identity_id) = revoked {
        sqlx::query("DELETE FROM users WHERE id = $1 AND role = $2")
            .bind(identity_id)
            .bind(UserRole::Renter)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
    }

    tx.commit().await.map_err(map_db_error)?;
    Ok(updated)
}

/// A member demoted from main renter loses their login identity along with
/// the role; returns the identity mirror row to remove, if any.
fn revoked_identity(previous: Option<Uuid>, is_main_renter: bool) -> Option<Uuid> {
    match previous {
        Some(identity_id) if !is_main_renter => Some(identity_id),
        _ => None,
    }
}

/// Removes the member and, when one was provisioned, the linked renter
/// identity mirror row.
pub async fn delete(pool: &PgPool, member: &FlatMember) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    sqlx::query("DELETE FROM flat_members WHERE id = $1")
        .bind(member.id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

    if let Some(user_id) = member.user_id {
        sqlx::query("DELETE FROM users WHERE id = $1 AND role = $2")
            .bind(user_id)
            .bind(UserRole::Renter)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
    }

    tx.commit().await.map_err(map_db_error)
}

#[derive(Debug, Clone, Copy)]
pub enum DocumentKind {
    Aadhar,
    Pan,
    Other,
}

impl DocumentKind {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "aadhar" => Ok(Self::Aadhar),
            "pan" => Ok(Self::Pan),
            "other" => Ok(Self::Other),
            other => Err(AppError::BadRequest(format!(
                "Unknown document kind '{other}'. Expected aadhar, pan or other."
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aadhar => "aadhar",
            Self::Pan => "pan",
            Self::Other => "other",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Aadhar => "aadhar_document_url",
            Self::Pan => "pan_document_url",
            Self::Other => "other_document_url",
        }
    }
}

pub async fn set_document_url(
    pool: &PgPool,
    member_id: Uuid,
    kind: DocumentKind,
    url: &str,
) -> Result<FlatMember, AppError> {
    sqlx::query_as::<_, FlatMember>(&format!(
        "UPDATE flat_members SET {} = $2 WHERE id = $1 RETURNING {MEMBER_COLUMNS}",
        kind.column()
    ))
    .bind(member_id)
    .bind(url)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

async fn provision_renter_identity(
    tx: &mut PgConnection,
    email: &str,
    full_name: &str,
) -> Result<Uuid, AppError> {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(email)
        .bind(full_name)
        .bind(UserRole::Renter)
        .execute(tx)
        .await
        .map_err(map_db_error)?;
    Ok(user_id)
}

async fn main_renter_exists(
    pool: &PgPool,
    flat_id: Uuid,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM flat_members
            WHERE flat_id = $1 AND is_main_renter
              AND ($2::uuid IS NULL OR id <> $2)
        )",
    )
    .bind(flat_id)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Identity document numbers are unique across the whole system, not just a
/// flat: aadhar and PAN identify a person, not a tenancy.
async fn document_number_taken(
    pool: &PgPool,
    aadhar_number: &str,
    pan_number: &str,
    exclude: Option<Uuid>,
) -> Result<Option<&'static str>, AppError> {
    let (aadhar_taken, pan_taken): (bool, bool) = sqlx::query_as(
        "SELECT
            EXISTS (SELECT 1 FROM flat_members
                    WHERE aadhar_number = $1 AND ($3::uuid IS NULL OR id <> $3)),
            EXISTS (SELECT 1 FROM flat_members
                    WHERE pan_number = $2 AND ($3::uuid IS NULL OR id <> $3))",
    )
    .bind(aadhar_number)
    .bind(pan_number)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    if aadhar_taken {
        return Ok(Some("aadhar number"));
    }
    if pan_taken {
        return Ok(Some("PAN number"));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::revoked_identity;
    use uuid::Uuid;

    #[test]
    fn demotion_revokes_the_linked_identity() {
        let identity_id = Uuid::new_v4();
        assert_eq!(revoked_identity(Some(identity_id), false), Some(identity_id));
        // Staying main, or never having had a login, revokes nothing.
        assert_eq!(revoked_identity(Some(identity_id), true), None);
        assert_eq!(revoked_identity(None, false), None);
    }
}
