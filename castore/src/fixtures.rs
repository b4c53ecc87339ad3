use crate::B3Digest;
use lazy_static::lazy_static;

pub const HELLOWORLD_BLOB_CONTENTS: &[u8] = b"Hello World!";

lazy_static! {
    // 2 bytes, not valid UTF-8 text
    pub static ref BLOB_A: bytes::Bytes = vec![0x00, 0x01].into();
    pub static ref BLOB_A_DIGEST: B3Digest = blake3::hash(&BLOB_A).as_bytes().into();

    // 1MB
    pub static ref BLOB_B: bytes::Bytes = (0..255).collect::<Vec<u8>>().repeat(4 * 1024).into();

    // A small variables file as it would be attached to a tier folder.
    pub static ref TFVARS_BLOB: bytes::Bytes =
        bytes::Bytes::from_static(b"instance_type = \"t3.micro\"\n");
}
