//! Window presentation of the simulation image

pub mod presenter;
pub mod texture;

pub use presenter::Presenter;
pub use texture::PixelTexture;

/// Fullscreen-triangle blit of the grid image
pub(crate) const BLIT_SOURCE: &str = include_str!("blit.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blit_shader_validates() {
        let module = naga::front::wgsl::parse_str(BLIT_SOURCE)
            .unwrap_or_else(|e| panic!("{}", e.emit_to_string(BLIT_SOURCE)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("{}", e.emit_to_string(BLIT_SOURCE)));

        let stages: Vec<_> = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect();
        assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }
}
