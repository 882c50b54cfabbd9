use redmine::UserId;

/// Picks the user following `last_assignee` in `ids`, wrapping around at the
/// end. Falls back to the first id when there is no previous assignee or it
/// is not part of the rotation.
pub fn next_assignee(ids: &[UserId], last_assignee: Option<UserId>) -> Option<UserId> {
    let first = *ids.first()?;

    let next = last_assignee
        .and_then(|last| ids.iter().position(|&id| id == last))
        .and_then(|index| ids.get(index + 1).copied())
        .unwrap_or(first);

    Some(next)
}
