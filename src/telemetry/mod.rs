pub mod reissue;
