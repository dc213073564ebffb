/// Validates the "all-or-none" shape required of the remote-write env vars
/// (§6): either every one of `vars` is set to a non-empty value, or every
/// one is absent/empty. Returns the set values in order on success.
pub fn all_or_none(names: &[&str]) -> Result<Vec<Option<String>>, crate::Error> {
    let values: Vec<Option<String>> = names
        .iter()
        .map(|n| std::env::var(n).ok().filter(|v| !v.is_empty()))
        .collect();
    let set_count = values.iter().filter(|v| v.is_some()).count();
    if set_count != 0 && set_count != names.len() {
        return Err(crate::Error::InvalidSpec(format!(
            "environment variables {names:?} must be all set or all empty, found {set_count}/{} set",
            names.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_set_or_all_absent_is_fine() {
        // SAFETY: test runs single-threaded within this process's test harness;
        // no other test observes these variable names concurrently.
        unsafe {
            std::env::remove_var("AON_TEST_A");
            std::env::remove_var("AON_TEST_B");
        }
        assert!(all_or_none(&["AON_TEST_A", "AON_TEST_B"]).is_ok());
        unsafe {
            std::env::set_var("AON_TEST_A", "x");
            std::env::set_var("AON_TEST_B", "y");
        }
        assert!(all_or_none(&["AON_TEST_A", "AON_TEST_B"]).is_ok());
        unsafe {
            std::env::remove_var("AON_TEST_A");
            std::env::remove_var("AON_TEST_B");
        }
    }

    #[test]
    fn mixed_state_is_rejected() {
        unsafe {
            std::env::set_var("AON_TEST_C", "x");
            std::env::remove_var("AON_TEST_D");
        }
        assert!(all_or_none(&["AON_TEST_C", "AON_TEST_D"]).is_err());
        unsafe {
            std::env::remove_var("AON_TEST_C");
        }
    }
}
