use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=shaders");

    let out_dir = env::var("OUT_DIR").unwrap();
    let compiler = shaderc::Compiler::new().unwrap();

    let shader_dir = Path::new("shaders");
    if !shader_dir.exists() {
        return;
    }

    for entry in fs::read_dir(shader_dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let kind = if file_name.ends_with(".vert") {
            shaderc::ShaderKind::Vertex
        } else if file_name.ends_with(".frag") {
            shaderc::ShaderKind::Fragment
        } else if file_name.ends_with(".comp") {
            shaderc::ShaderKind::Compute
        } else {
            continue;
        };

        let source = fs::read_to_string(&path).unwrap();

        match compiler.compile_into_spirv(&source, kind, file_name, "main", None) {
            Ok(binary) => {
                let out_path = PathBuf::from(&out_dir).join(format!("{file_name}.spv"));
                fs::write(&out_path, binary.as_binary_u8()).unwrap();
            }
            Err(e) => {
                panic!("Failed to compile shader {file_name}: {e}");
            }
        }
    }
}
