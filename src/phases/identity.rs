//! Session identity allocation.
//!
//! A session is named `{workshop}-{token}` where the token is drawn from
//! [`SESSION_TOKEN_ALPHABET`]. Session names only have to be unique among
//! Sessions, but the session namespace shares the name and namespace names
//! are global, so a pair is allocated together: the Session is created first,
//! then its namespace. When the namespace name is taken the Session is
//! deleted again and a new token is tried. Both kinds of conflict count
//! against the same retry bound.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use log::{debug, warn};
use rand::Rng;
use serde_yaml::Value;

use super::{create_object, delete_if_exists, Resources};
use crate::cluster::ClusterApi;
use crate::defaults::{
    PASSWORD_ALPHABET, PASSWORD_LENGTH, SESSION_TOKEN_ALPHABET, SESSION_TOKEN_LENGTH,
};
use crate::error::{Error, Result};
use crate::object;
use crate::session::{session_body, SessionSpec};

/// Draws `length` characters from `alphabet`.
fn random_string<R: Rng>(rng: &mut R, alphabet: &str, length: usize) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

/// A fresh session token.
pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    random_string(rng, SESSION_TOKEN_ALPHABET, SESSION_TOKEN_LENGTH)
}

/// A password for a workshop user who did not pick one.
pub fn generate_password<R: Rng>(rng: &mut R) -> String {
    random_string(rng, PASSWORD_ALPHABET, PASSWORD_LENGTH)
}

/// A Session and its namespace, both created.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub session: Value,
    pub session_name: String,
    pub session_uid: String,
    pub user_id: String,
}

fn namespace_body(name: &str, owner: OwnerReference) -> Result<Value> {
    object::to_object(&Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Creates a uniquely named Session for `workshop` and its namespace.
///
/// Makes at most `retries + 1` attempts. When every attempt conflicts no
/// Session is left behind.
pub fn allocate<R: Rng>(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    workshop: &str,
    spec: &SessionSpec,
    workshop_owner: Option<&OwnerReference>,
    retries: usize,
    rng: &mut R,
) -> Result<Allocation> {
    let attempts = retries + 1;
    for attempt in 1..=attempts {
        let user_id = generate_token(rng);
        let session_name = format!("{}-{}", workshop, user_id);

        let body = session_body(&session_name, spec, workshop_owner.cloned())?;
        let session = match create_object(cluster, &resources.session, None, &body) {
            Ok(session) => session,
            Err(err) if err.is_conflict() => {
                debug!(
                    "session name {} taken (attempt {}/{})",
                    session_name, attempt, attempts
                );
                continue;
            }
            Err(err) => return Err(err),
        };

        let owner = object::owner_reference(&session, true)?;
        let namespace = namespace_body(&session_name, owner)?;
        match create_object(cluster, &resources.namespace, None, &namespace) {
            Ok(_) => {}
            Err(err) if err.is_conflict() => {
                warn!(
                    "namespace {} already exists, discarding session (attempt {}/{})",
                    session_name, attempt, attempts
                );
                delete_if_exists(cluster, &resources.session, None, &session_name)?;
                continue;
            }
            Err(err) => return Err(err),
        }

        return Ok(Allocation {
            session_uid: object::require_uid(&session)?,
            session,
            session_name,
            user_id,
        });
    }

    Err(Error::SessionAllocation {
        workshop: workshop.to_string(),
        attempts,
    })
}
