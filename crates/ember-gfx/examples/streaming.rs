//! Streams textures and meshes from disk on the headless backend.
//!
//! This example shows:
//! - Setting up `GfxResources` over a directory
//! - Shared creation and placeholders while files are in flight
//! - Pumping updates once per frame and draining events
//! - Destroying a level's resources by label
//!
//! Set `EMBER_PROFILE=1` to serve puffin data on port 8585.

use std::sync::Arc;

use ember_core::profiling::{ProfilingBackend, init_profiling, new_frame};
use ember_gfx::texture::TEXTURE_PLACEHOLDER;
use ember_gfx::*;
use ember_resource::{FileReader, ResourceEvent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    ember_core::logging::init();
    if std::env::var_os("EMBER_PROFILE").is_some() {
        init_profiling(ProfilingBackend::PuffinHttp);
    }

    let temp_dir = tempfile::tempdir()?;
    create_test_assets(temp_dir.path())?;

    let backend = Arc::new(HeadlessBackend::new());
    let mut gfx = GfxResources::new(backend.clone(), FileReader::new(temp_dir.path()));
    gfx.setup(&GfxConfig::default().with_io_reads_per_frame(2));

    println!("\n=== Placeholder ===\n");
    let checker = gfx.create_texture_with_data(
        TextureSetup::from_file("builtin:checker"),
        encode_texture(2, 2, PixelFormat::Rgba8, &[0x80; 16]),
    )?;
    gfx.set_texture_placeholder(TEXTURE_PLACEHOLDER, checker);
    println!("Checker texture: {}", checker);

    println!("\n=== Level ===\n");
    let level = gfx.push_new_label();
    let mut ids = Vec::new();
    for i in 0..4 {
        let setup = TextureSetup::from_file(format!("rock{}.etex", i).as_str()).with_placeholder(TEXTURE_PLACEHOLDER);
        ids.push(gfx.create_texture(setup)?);
    }
    // second request for the same file shares the first
    let again = gfx.create_texture(TextureSetup::from_file("rock0.etex"))?;
    println!("rock0 shared: {}", again == ids[0]);
    ids.push(gfx.create_mesh(MeshSetup::from_file("ground.emsh"))?);
    ids.push(gfx.create_mesh(MeshSetup::from_file("missing.emsh"))?);
    gfx.pop_label();

    let mut frame = 0;
    while gfx.io().lock().num_pending() > 0 || frame == 0 {
        new_frame();
        gfx.update();
        frame += 1;
        for event in gfx.drain_events() {
            match event {
                ResourceEvent::Created { id, locator } => println!("frame {}: created {} ({})", frame, locator, id),
                ResourceEvent::LoadFailed { locator, error, .. } => {
                    println!("frame {}: failed {}: {}", frame, locator, error)
                }
                ResourceEvent::Removed { id } => println!("frame {}: removed {}", frame, id),
            }
        }
    }

    if let Some(texture) = gfx.texture(ids[0]) {
        println!("\nrock0: {}x{} {:?}", texture.width, texture.height, texture.format);
    }
    println!(
        "Backend: {} textures, {} buffers ({} bytes)",
        backend.num_live_textures(),
        backend.num_live_buffers(),
        backend.buffer_bytes()
    );

    println!("\n=== Unload ===\n");
    println!("Destroyed {} resources", gfx.destroy(level));
    gfx.release(checker);
    gfx.discard();
    println!(
        "Backend: {} textures, {} buffers",
        backend.num_live_textures(),
        backend.num_live_buffers()
    );

    Ok(())
}

fn create_test_assets(path: &std::path::Path) -> std::io::Result<()> {
    for i in 0..4u32 {
        let size = 4 << i;
        let pixels: Vec<u8> = (0..size * size * 4).map(|p| (p % 251) as u8).collect();
        std::fs::write(
            path.join(format!("rock{}.etex", i)),
            encode_texture(size, size, PixelFormat::Rgba8, &pixels),
        )?;
    }

    let n = [0.0, 1.0, 0.0];
    let vertices = [
        Vertex::new([-10.0, 0.0, -10.0], n, [0.0, 0.0]),
        Vertex::new([10.0, 0.0, -10.0], n, [1.0, 0.0]),
        Vertex::new([10.0, 0.0, 10.0], n, [1.0, 1.0]),
        Vertex::new([-10.0, 0.0, 10.0], n, [0.0, 1.0]),
    ];
    std::fs::write(
        path.join("ground.emsh"),
        encode_mesh(&vertices, &Indices::U16(vec![0, 1, 2, 0, 2, 3])),
    )?;
    Ok(())
}
