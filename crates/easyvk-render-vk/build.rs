use std::{env, path::PathBuf};

fn main() {
    let manifest = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let shaders = manifest.join("shaders");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=shaders");

    let dir = shader_dir(&shaders);
    println!("cargo:rustc-env=EASYVK_SHADER_DIR={}", dir.display());
}

#[cfg(not(feature = "compile-shaders"))]
fn shader_dir(shaders: &std::path::Path) -> PathBuf {
    shaders.to_path_buf()
}

#[cfg(feature = "compile-shaders")]
fn shader_dir(shaders: &std::path::Path) -> PathBuf {
    use std::fs;

    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();

    // Vulkan 1.0 is enough for the triangle.
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (file, kind) in [
        ("triangle.vert", shaderc::ShaderKind::Vertex),
        ("triangle.frag", shaderc::ShaderKind::Fragment),
    ] {
        let src = fs::read_to_string(shaders.join(file)).unwrap();
        let spv = comp
            .compile_into_spirv(&src, kind, file, "main", Some(&opts))
            .unwrap();
        fs::write(out.join(format!("{file}.spv")), spv.as_binary_u8()).unwrap();
    }
    out
}
