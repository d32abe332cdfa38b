// AMI push task library, consumed by the ami-push binary and the
// integration tests

pub mod push;
