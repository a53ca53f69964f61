//! Integration tests for the pubtree CLI
//!
//! These tests drive the command functions over real files:
//! ICML -> canonical XML -> ICML

use std::fs;
use std::io::Write;

use pubtree_cli::app::{load_options, ConvertArgs};
use pubtree_cli::{export_command, import_command, stylesheet_command, OutputFormat};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const STORY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<?aid style="50" type="snippet" readerVersion="6.0" featureSet="513" product="8.0(370)" ?>
<Document DOMVersion="8.0" Self="d">
<RootParagraphStyleGroup Self="g1">
<ParagraphStyle Self="ParagraphStyle/$ID/NormalParagraphStyle" Name="$ID/NormalParagraphStyle" PointSize="12"/>
<ParagraphStyle Self="ParagraphStyle/BodyText" Name="Body Text" PointSize="10" FontStyle="Italic"><Properties><BasedOn type="object">ParagraphStyle/$ID/NormalParagraphStyle</BasedOn></Properties></ParagraphStyle>
</RootParagraphStyleGroup>
<Story Self="u1">
<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/BodyText">
<CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><HyperlinkTextDestination Self="HyperlinkTextDestination/start" Name="start" Hidden="false"/><Content>Opening line</Content><Br/><Content>Second line </Content><HyperlinkTextSource Self="hs1" Name="back" Hidden="false"><Content>back</Content></HyperlinkTextSource><Br/></CharacterStyleRange>
</ParagraphStyleRange>
</Story>
<Hyperlink Self="h1" Name="back" Source="hs1" Visible="false"><Properties><Destination type="object">HyperlinkTextDestination/start</Destination></Properties></Hyperlink>
</Document>
"#;

fn args() -> ConvertArgs {
    ConvertArgs::default()
}

#[test]
fn test_import_writes_canonical_xml() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ch01.icml");
    fs::write(&input, STORY).unwrap();

    let options = load_options(&input, &args()).unwrap();
    let written = import_command(&input, None, &options, OutputFormat::Json).unwrap();
    assert_eq!(written, dir.path().join("ch01.xml"));

    let xml = fs::read_to_string(&written).unwrap();
    assert!(xml.contains("Opening line"));
    assert!(xml.contains("Second line"));
    assert!(xml.contains(r#"href="ch01.xml#ch01_start""#));
    assert!(xml.contains(r#"class="Body-Text""#));
}

#[test]
fn test_import_then_export_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ch01.icml");
    fs::write(&input, STORY).unwrap();
    let options = load_options(&input, &args()).unwrap();
    let canonical = import_command(&input, None, &options, OutputFormat::Json).unwrap();

    let icml_out = dir.path().join("out").join("ch01.icml");
    fs::create_dir_all(icml_out.parent().unwrap()).unwrap();
    let options = load_options(&canonical, &args()).unwrap();
    let written = export_command(&canonical, Some(&icml_out), &options, OutputFormat::Json).unwrap();
    assert_eq!(written, vec![icml_out.clone()]);

    let icml = fs::read_to_string(&icml_out).unwrap();
    assert!(icml.starts_with("<?xml"));
    assert!(icml.contains("<?aid"));
    assert!(icml.contains("ParagraphStyle/BodyText"));
    assert!(icml.contains("HyperlinkTextSource"));
    assert!(icml.contains("Opening line"));
}

#[test]
fn test_export_writes_endnotes_beside_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.xml");
    fs::write(
        &input,
        r#"<document><body><section id="s1"><p>Claim<endnote id="1"><p>Source for the claim</p></endnote></p></section></body></document>"#,
    )
    .unwrap();

    let options = load_options(&input, &args()).unwrap();
    let written = export_command(&input, None, &options, OutputFormat::Json).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[1], dir.path().join("notes_Endnotes.icml"));
    let endnotes = fs::read_to_string(&written[1]).unwrap();
    assert!(endnotes.contains("Source for the claim"));
}

#[test]
fn test_config_file_sets_options() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pubtree.toml");
    fs::write(&config, "pts_per_em = 10.0\nconvert_lists = true\nunknown_key = 1\n").unwrap();
    let args = ConvertArgs {
        config: Some(config),
        ..ConvertArgs::default()
    };
    let options = load_options(&dir.path().join("ch01.icml"), &args).unwrap();
    assert_eq!(options.pts_per_em, 10.0);
    assert!(options.convert_lists);
    assert_eq!(options.document_name, "ch01");
}

#[test]
fn test_stylesheet_from_icml_and_idml() {
    let dir = TempDir::new().unwrap();
    let icml = dir.path().join("ch01.icml");
    fs::write(&icml, STORY).unwrap();
    let options = load_options(&icml, &args()).unwrap();
    let css_path = dir.path().join("ch01.css");
    let css = stylesheet_command(&icml, Some(&css_path), &options).unwrap();
    assert!(css.contains("p.Body-Text {"));
    assert_eq!(fs::read_to_string(&css_path).unwrap(), css);

    let idml = dir.path().join("book.idml");
    let file = fs::File::create(&idml).unwrap();
    let mut zip = ZipWriter::new(file);
    zip.start_file("designmap.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(br#"<Document xmlns:idPkg="x" Self="d"><idPkg:Styles src="Resources/Styles.xml"/></Document>"#)
        .unwrap();
    zip.start_file("Resources/Styles.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(br#"<idPkg:Styles xmlns:idPkg="x"><RootCharacterStyleGroup Self="g"><CharacterStyle Self="CharacterStyle/Strong" Name="Strong" FontStyle="Bold"/></RootCharacterStyleGroup></idPkg:Styles>"#)
        .unwrap();
    zip.finish().unwrap();

    let css = stylesheet_command(&idml, None, &options).unwrap();
    assert!(css.contains("span.Strong, a.Strong {"));
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("absent.icml");
    let options = load_options(&input, &args()).unwrap();
    let err = import_command(&input, None, &options, OutputFormat::Json).unwrap_err();
    assert!(err.to_string().contains("Input file not found"));
}
