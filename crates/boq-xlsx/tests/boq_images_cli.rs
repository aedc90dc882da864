use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Output};

use boq_xlsx::{DRAWING_PART, DRAWING_RELS_PART};
use zip::write::FileOptions;
use zip::ZipWriter;

fn write_workbook(path: &Path) {
    let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.jpg"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image2.png"/>
</Relationships>"#;
    let drawing = r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<xdr:oneCellAnchor><xdr:from><xdr:col>7</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>4</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="10" cy="10"/><xdr:pic><xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill></xdr:pic><xdr:clientData/></xdr:oneCellAnchor>
<xdr:oneCellAnchor><xdr:from><xdr:col>7</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>69</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="10" cy="10"/><xdr:pic><xdr:blipFill><a:blip r:embed="rId2"/></xdr:blipFill></xdr:pic><xdr:clientData/></xdr:oneCellAnchor>
</xdr:wsDr>"#;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default();
    for (name, bytes) in [
        (DRAWING_RELS_PART, rels.as_bytes()),
        (DRAWING_PART, drawing.as_bytes()),
        ("xl/media/image1.jpg", b"jpeg-bytes".as_slice()),
        ("xl/media/image2.png", b"png".as_slice()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

fn boq_images(args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("boq-images"))
        .args(args)
        .output()
        .expect("run boq-images")
}

#[test]
fn lists_row_images_as_text() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("boq.xlsx");
    write_workbook(&input);

    let output = boq_images(&[input.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "4\timage/jpeg\t10\txl/media/image1.jpg\n69\timage/png\t3\txl/media/image2.png\n"
    );
}

#[test]
fn lists_row_images_as_json() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("boq.xlsx");
    write_workbook(&input);

    let output = boq_images(&[input.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        report["images"],
        serde_json::json!([
            {"row": 4, "content_type": "image/jpeg", "bytes": 10, "part": "xl/media/image1.jpg"},
            {"row": 69, "content_type": "image/png", "bytes": 3, "part": "xl/media/image2.png"},
        ])
    );
}

#[test]
fn stores_images_under_out_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("boq.xlsx");
    let out = tmp.path().join("store");
    write_workbook(&input);

    let output = boq_images(&[
        input.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--project",
        "proj-3",
        "--token",
        "42",
        "--base-url",
        "https://files.test/boq/",
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["project"], "proj-3");
    assert_eq!(
        report["stored"],
        serde_json::json!([
            {"row": 4, "url": "https://files.test/boq/proj-3/42-4.jpg"},
            {"row": 69, "url": "https://files.test/boq/proj-3/42-69.png"},
        ])
    );
    assert_eq!(report["failed"], serde_json::json!([]));
    assert_eq!(
        std::fs::read(out.join("proj-3").join("42-4.jpg")).unwrap(),
        b"jpeg-bytes"
    );

    // Re-running with the same token leaves existing objects alone and reports the rows.
    let rerun = boq_images(&[
        input.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--project",
        "proj-3",
        "--token",
        "42",
    ]);
    assert!(rerun.status.success());
    assert!(rerun.stdout.is_empty());
    let stderr = String::from_utf8(rerun.stderr).unwrap();
    assert!(stderr.contains("row 4: failed to store proj-3/42-4.jpg"), "{stderr}");
}

#[test]
fn corrupt_input_exits_with_error() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("broken.xlsx");
    std::fs::write(&input, b"definitely not a zip").unwrap();

    let output = boq_images(&[input.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("extract images from"), "{stderr}");
}

#[test]
fn part_limit_flag_skips_oversized_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("boq.xlsx");
    write_workbook(&input);

    // Both images fit in 10 bytes; the drawing parts do not, so nothing is anchored.
    let output = boq_images(&[input.to_str().unwrap(), "--max-part-bytes", "10"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let output = boq_images(&[input.to_str().unwrap(), "--max-part-bytes", "4096"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2, "{stdout}");
}
