//! The kernel - pure transitions over the entry list.

use shapewise_types::{Namespace, QuerySettings, QueryShapeConfiguration, ShapeKey};

use crate::mutation::{Change, Mutation, Transition};

/// Computes the entry list that results from applying `mutation`.
///
/// Entries other than the targeted one are carried over unchanged and in
/// order. A replaced entry keeps its position.
pub fn apply_mutation(
    entries: &[QueryShapeConfiguration],
    mutation: Mutation,
) -> Result<Transition, KernelError> {
    let position = entries.iter().position(|e| e.shape_key == *mutation.key());

    let transition = match mutation {
        Mutation::Upsert(entry) => {
            validate_settings(&entry.settings)?;
            if entry.namespace.is_internal() {
                return Err(KernelError::InternalNamespace(entry.namespace));
            }

            let mut next = entries.to_vec();
            let change = match position {
                Some(index) => {
                    next[index] = entry;
                    Change::Replaced
                }
                None => {
                    next.push(entry);
                    Change::Inserted
                }
            };
            Transition {
                entries: next,
                change,
            }
        }

        Mutation::Remove(key) => match position {
            Some(index) => {
                let mut next = entries.to_vec();
                next.remove(index);

                // Postcondition: key is gone
                debug_assert!(next.iter().all(|e| e.shape_key != key));

                Transition {
                    entries: next,
                    change: Change::Removed,
                }
            }
            None => Transition {
                entries: entries.to_vec(),
                change: Change::NotPresent,
            },
        },

        Mutation::UpdateSettings { key, settings } => {
            validate_settings(&settings)?;
            let index = position.ok_or(KernelError::ShapeNotFound(key))?;

            let mut next = entries.to_vec();
            next[index].settings = settings;
            Transition {
                entries: next,
                change: Change::Replaced,
            }
        }
    };

    // Postcondition: at most one entry per shape key
    debug_assert!(has_unique_keys(&transition.entries));

    Ok(transition)
}

/// Checks that settings are a non-empty object.
///
/// Individual setting names and values are not interpreted here.
pub fn validate_settings(settings: &QuerySettings) -> Result<(), KernelError> {
    let object = settings
        .as_value()
        .as_object()
        .ok_or(KernelError::SettingsNotAnObject)?;
    if object.is_empty() {
        return Err(KernelError::EmptySettings);
    }
    Ok(())
}

fn has_unique_keys(entries: &[QueryShapeConfiguration]) -> bool {
    let mut keys: Vec<&ShapeKey> = entries.iter().map(|e| &e.shape_key).collect();
    keys.sort_unstable();
    keys.windows(2).all(|pair| pair[0] != pair[1])
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("query settings must be an object")]
    SettingsNotAnObject,

    #[error("query settings cannot be empty")]
    EmptySettings,

    #[error("query settings cannot be set on internal namespace {0}")]
    InternalNamespace(Namespace),

    #[error("no query settings exist for shape {0}")]
    ShapeNotFound(ShapeKey),
}
