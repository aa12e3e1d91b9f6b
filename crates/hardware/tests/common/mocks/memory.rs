use mockall::mock;
use o3sim_core::common::{Endian, MemAccess};
use o3sim_core::emu::MemImage;

mock! {
    pub Image {}
    impl MemImage for Image {
        fn read(&self, access: &mut MemAccess);
        fn write(&mut self, access: &mut MemAccess);
        fn endian(&self) -> Endian;
    }
}

/// A little-endian image that fails the test if it is ever read or written.
pub fn untouchable_image() -> MockImage {
    let mut image = MockImage::new();
    let _ = image.expect_endian().return_const(Endian::Little);
    let _ = image.expect_read().never();
    let _ = image.expect_write().never();
    image
}
