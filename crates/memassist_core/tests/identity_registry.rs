use image::{ImageBuffer, ImageFormat, Rgb};
use memassist_core::db::open_db_in_memory;
use memassist_core::face::registry::encoding_file_name;
use memassist_core::{
    EncoderError, ErrorCategory, FaceEncoder, FaceEncoding, FaceRegistry, IdentityError,
    IdentityService, PersonRepository, PhotoStore, SqlitePersonRepository, DEFAULT_TOLERANCE,
};
use rusqlite::Connection;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RED: [u8; 3] = [200, 10, 10];
const RED_VARIANT: [u8; 3] = [205, 14, 8];
const BLUE: [u8; 3] = [10, 10, 200];
const BLACK: [u8; 3] = [0, 0, 0];

/// Treats every non-black pixel of the top row as one face whose vector is
/// the pixel color; adjacent identical pixels are the same face.
struct ColorFaceEncoder;

impl FaceEncoder for ColorFaceEncoder {
    fn encode_faces(&self, image: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError> {
        let decoded = image::load_from_memory(image)
            .map_err(|err| EncoderError::InvalidOutput(err.to_string()))?
            .to_rgb8();
        let mut faces: Vec<FaceEncoding> = Vec::new();
        for x in 0..decoded.width() {
            let pixel = decoded.get_pixel(x, 0).0;
            if pixel == BLACK {
                continue;
            }
            let face = FaceEncoding::new(pixel.iter().map(|c| f64::from(*c) / 255.0).collect());
            if faces.last() != Some(&face) {
                faces.push(face);
            }
        }
        Ok(faces)
    }
}

struct Fixture {
    dir: TempDir,
    conn: Connection,
    registry: FaceRegistry,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = FaceRegistry::open(dir.path().join("known_faces")).unwrap();
        Self {
            conn: open_db_in_memory().unwrap(),
            registry,
            dir,
        }
    }

    fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn service(&mut self) -> IdentityService<'_, SqlitePersonRepository<'_>, ColorFaceEncoder> {
        let photos = PhotoStore::open(self.dir.path().join("uploads")).unwrap();
        IdentityService::new(
            SqlitePersonRepository::try_new(&self.conn).unwrap(),
            ColorFaceEncoder,
            photos,
            &mut self.registry,
        )
    }
}

fn photo(left: [u8; 3], right: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::from_fn(2, 2, |x, _| if x == 0 { Rgb(left) } else { Rgb(right) });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn face(color: [u8; 3]) -> Vec<u8> {
    photo(color, color)
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}

#[test]
fn register_then_identify_variant_reports_fixed_confidence() {
    let mut fixture = Fixture::new();
    let mut service = fixture.service();

    let alice = service
        .register(&face(RED), " Alice ", "Daughter", "Visits on Sundays")
        .unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.relation, "Daughter");

    let found = service.identify(&face(RED_VARIANT), DEFAULT_TOLERANCE).unwrap();
    assert_eq!(found.name, "Alice");
    assert_eq!(found.match_confidence, 0.4);
    assert_eq!(found.relation.as_deref(), Some("Daughter"));
    assert_eq!(found.description.as_deref(), Some("Visits on Sundays"));
}

#[test]
fn register_stores_photo_and_defaults_relation() {
    let mut fixture = Fixture::new();
    let uploads = fixture.uploads_dir();
    let mut service = fixture.service();

    let person = service.register(&face(BLUE), "Ravi", "  ", "").unwrap();
    assert_eq!(person.relation, "Unknown");
    assert!(person.photo_path.ends_with(".png"));
    assert!(uploads.join(&person.photo_path).is_file());
    assert_eq!(service.list_people().unwrap(), vec![person]);
}

#[test]
fn re_registering_a_name_keeps_only_the_latest_vector() {
    let mut fixture = Fixture::new();
    let mut service = fixture.service();

    service.register(&face(RED), "Alice", "Sister", "").unwrap();
    service.register(&face(BLUE), "Alice", "Friend", "").unwrap();

    assert_eq!(service.registry().len(), 1);
    let err = service.identify(&face(RED), DEFAULT_TOLERANCE).unwrap_err();
    assert!(matches!(err, IdentityError::PersonNotRecognized));

    // Enrichment comes from the oldest row with the name.
    let found = service.identify(&face(BLUE), DEFAULT_TOLERANCE).unwrap();
    assert_eq!(found.name, "Alice");
    assert_eq!(found.relation.as_deref(), Some("Sister"));
}

#[test]
fn identify_against_empty_registry_is_not_recognized() {
    let mut fixture = Fixture::new();
    let service = fixture.service();

    let err = service.identify(&face(RED), DEFAULT_TOLERANCE).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::PersonNotRecognized);
}

#[test]
fn faceless_image_fails_regardless_of_registry() {
    let mut fixture = Fixture::new();
    let mut service = fixture.service();

    let err = service.identify(&face(BLACK), DEFAULT_TOLERANCE).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NoFaceDetected);

    service.register(&face(RED), "Alice", "", "").unwrap();
    let err = service.identify(&face(BLACK), DEFAULT_TOLERANCE).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NoFaceDetected);

    let err = service.register(&face(BLACK), "Bob", "", "").unwrap_err();
    assert!(matches!(err, IdentityError::NoFaceDetected));
    assert!(service.registry().get("Bob").is_none());
}

#[test]
fn only_the_first_detected_face_is_used() {
    let mut fixture = Fixture::new();
    let mut service = fixture.service();

    service.register(&photo(RED, BLUE), "Alice", "", "").unwrap();
    let stored = service.registry().get("Alice").unwrap().clone();
    assert_eq!(
        stored,
        ColorFaceEncoder.encode_faces(&face(RED)).unwrap().remove(0)
    );

    let found = service.identify(&photo(BLUE, RED), DEFAULT_TOLERANCE);
    assert!(matches!(found, Err(IdentityError::PersonNotRecognized)));
}

#[test]
fn invalid_uploads_and_blank_names_are_validation_errors() {
    let mut fixture = Fixture::new();
    let uploads = fixture.uploads_dir();
    let mut service = fixture.service();

    let err = service
        .register(b"not an image", "Alice", "", "")
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidImage(_)));
    assert_eq!(err.category(), ErrorCategory::Validation);

    let err = service.register(&face(RED), "   ", "", "").unwrap_err();
    assert!(matches!(err, IdentityError::MissingName));

    let err = service.identify(&face(RED), -0.1).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    assert!(service.registry().is_empty());
    assert_eq!(file_count(&uploads), 0);
}

#[test]
fn failed_person_insert_leaves_registry_and_uploads_untouched() {
    let mut fixture = Fixture::new();
    let uploads = fixture.uploads_dir();
    let faces_dir = fixture.registry.dir().to_path_buf();
    {
        let mut service = fixture.service();
        service.register(&face(RED), "Alice", "", "").unwrap();
    }
    fixture
        .conn
        .execute_batch(
            "CREATE TRIGGER reject_people
             BEFORE INSERT ON people
             BEGIN
                 SELECT RAISE(ABORT, 'people are read-only');
             END;",
        )
        .unwrap();

    let mut service = fixture.service();
    let err = service.register(&face(BLUE), "Alice", "", "").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Persistence);
    let err = service.register(&face(BLUE), "Bob", "", "").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Persistence);

    let red = ColorFaceEncoder.encode_faces(&face(RED)).unwrap().remove(0);
    assert_eq!(service.registry().get("Alice"), Some(&red));
    assert!(service.registry().get("Bob").is_none());
    assert!(!faces_dir.join(encoding_file_name("Bob")).exists());
    assert_eq!(file_count(&uploads), 1);
}

#[test]
fn registry_reloads_the_same_vectors_from_disk() {
    let mut fixture = Fixture::new();
    {
        let mut service = fixture.service();
        service.register(&face(RED), "Alice", "", "").unwrap();
        service.register(&face(BLUE), "Mary Jane", "", "").unwrap();
    }

    let reloaded = FaceRegistry::open(fixture.registry.dir()).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get("Alice"), fixture.registry.get("Alice"));
    assert_eq!(reloaded.get("Mary Jane"), fixture.registry.get("Mary Jane"));
    assert_eq!(
        reloaded.names().collect::<Vec<_>>(),
        vec!["Alice", "Mary Jane"]
    );
}

#[test]
fn long_non_ascii_names_register_and_reload() {
    let mut fixture = Fixture::new();
    let name = "अनुराधा कृष्णमूर्ति ".repeat(6).trim().to_string();
    assert!(name.len() > 255);
    {
        let mut service = fixture.service();
        let person = service.register(&face(RED), &name, "Grandmother", "").unwrap();
        assert_eq!(person.name, name);
        let found = service.identify(&face(RED), 0.6).unwrap();
        assert_eq!(found.name, name);
    }

    let reloaded = FaceRegistry::open(fixture.registry.dir()).unwrap();
    assert_eq!(reloaded.names().collect::<Vec<_>>(), vec![name.as_str()]);
    assert_eq!(reloaded.get(&name), fixture.registry.get(&name));
}

#[test]
fn damaged_vector_files_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(encoding_file_name("Broken")), b"{oops").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
    std::fs::write(
        dir.path().join(encoding_file_name("Alice")),
        br#"{"name":"Alice","values":[0.1,0.2]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join(encoding_file_name("Nameless")),
        br#"{"values":[0.3]}"#,
    )
    .unwrap();

    let registry = FaceRegistry::open(dir.path()).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Alice"]);
}

#[test]
fn remove_is_a_noop_for_unknown_names() {
    let mut fixture = Fixture::new();
    let mut service = fixture.service();
    service.register(&face(RED), "Alice", "", "").unwrap();

    assert!(service.remove("Alice").unwrap());
    assert!(!service.remove("Alice").unwrap());
    assert!(!service.remove("Nobody").unwrap());
    let err = service.identify(&face(RED), DEFAULT_TOLERANCE).unwrap_err();
    assert!(matches!(err, IdentityError::PersonNotRecognized));
}

#[test]
fn delete_person_drops_vector_only_with_the_last_row() {
    let mut fixture = Fixture::new();
    let uploads = fixture.uploads_dir();
    let mut service = fixture.service();

    let first = service.register(&face(RED), "Alice", "", "").unwrap();
    let second = service.register(&face(RED), "Alice", "", "").unwrap();
    assert_eq!(file_count(&uploads), 2);

    let deleted = service.delete_person(first.id).unwrap();
    assert_eq!(deleted.id, first.id);
    assert!(service.registry().get("Alice").is_some());
    assert!(!uploads.join(&first.photo_path).exists());

    service.delete_person(second.id).unwrap();
    assert!(service.registry().get("Alice").is_none());
    assert_eq!(file_count(&uploads), 0);

    let err = service.delete_person(second.id).unwrap_err();
    assert!(matches!(err, IdentityError::PersonNotFound(id) if id == second.id));
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[test]
fn person_repository_lists_newest_first_and_counts_by_name() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let person = |name: &str| memassist_core::NewPerson::normalized(name, "", "", "p.png").unwrap();

    let a = repo.create_person(&person("Alice")).unwrap();
    let b = repo.create_person(&person("Bob")).unwrap();
    let c = repo.create_person(&person("Alice")).unwrap();

    let ids: Vec<_> = repo.list_people().unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![c, b, a]);
    assert_eq!(repo.count_by_name("Alice").unwrap(), 2);
    assert_eq!(repo.count_by_name("alice").unwrap(), 0);
    assert_eq!(repo.find_first_by_name("Alice").unwrap().unwrap().id, a);
}
