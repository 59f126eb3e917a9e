pub mod slug;

#[cfg(test)]
pub mod test_utils;
