pub mod config;
pub mod error;
pub mod events;
pub mod matting;
pub mod studio;
pub mod processing {
    pub mod color;
    pub mod layout;
    pub mod normalize;
}
pub mod render {
    pub mod camera;
    pub mod compositor;
    pub mod lighting;
    pub mod texture;
    pub mod zones;
}
pub mod tasks {
    pub mod removal;
}
