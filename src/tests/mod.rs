pub(crate) mod retry_401_success;
