// tests/common/mod.rs

//! Shared test utilities and in-memory capabilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use knxkit::content::{ContentParser, XmlContentParser};
use knxkit::extract::{ArchiveExtractor, Extractor};
use knxkit::remote::{ArchiveDownloader, ReleaseLister};
use knxkit::{CacheStore, Capabilities, Error, Release, Repository, Result, Signer, Toolbox};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Product definition shipped in test releases
pub const OGM_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<KNX xmlns="http://knx.org/xml/project/20">
  <ManufacturerData>
    <Manufacturer RefId="M-00FA">
      <Catalog>
        <CatalogSection Id="M-00FA_CS-1">
          <CatalogItem Id="M-00FA_CI-1" Name="Logic Module" />
        </CatalogSection>
      </Catalog>
      <Hardware>
        <Hardware Id="M-00FA_H-1">
          <Products>
            <Product Id="M-00FA_H-1_P-1" Text="Logic Module" OrderNumber="OGM-1" />
            <Product Id="M-00FA_H-1_P-2" Text="Logic Module Pro" OrderNumber="OGM-2" />
          </Products>
        </Hardware>
      </Hardware>
    </Manufacturer>
  </ManufacturerData>
</KNX>
"#;

pub fn release(name: &str, (major, minor, build): (u32, u32, u32), prerelease: bool) -> Release {
    Release {
        name: name.to_string(),
        url: format!("https://example.invalid/download/{name}"),
        major,
        minor,
        build,
        published: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        is_prerelease: prerelease,
    }
}

/// A two-repository catalog: OGM with one release, SEN with two
pub fn sample_catalog() -> Vec<Repository> {
    vec![
        Repository::new(
            "OGM",
            vec![release("OGM-1.2.3.zip", (1, 2, 3), false)],
        ),
        Repository::new(
            "SEN",
            vec![
                release("SEN-2.0.0.zip", (2, 0, 0), true),
                release("SEN-1.0.0.zip", (1, 0, 0), false),
            ],
        ),
    ]
}

/// Lister returning a fixed listing, optionally failing or blocking
pub struct StaticLister {
    repositories: Mutex<Vec<Repository>>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl StaticLister {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories: Mutex::new(repositories),
            fail: false,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Listing completes only after `notify` fires
    pub fn blocking(repositories: Vec<Repository>, notify: Arc<Notify>) -> Self {
        Self {
            gate: Some(notify),
            ..Self::new(repositories)
        }
    }

    pub fn set(&self, repositories: Vec<Repository>) {
        *self.repositories.lock() = repositories;
    }
}

#[async_trait]
impl ReleaseLister for StaticLister {
    async fn list_releases(&self, include_prereleases: bool) -> Result<Vec<Repository>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(notify) = &self.gate {
            notify.notified().await;
        }
        if self.fail {
            return Err(Error::RefreshError("remote unavailable".to_string()));
        }

        let mut repositories = self.repositories.lock().clone();
        if !include_prereleases {
            for repo in &mut repositories {
                repo.releases.retain(|r| !r.is_prerelease);
            }
        }
        Ok(repositories)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Downloader writing a fixed payload, optionally failing or blocking
pub struct PayloadDownloader {
    payload: Mutex<Vec<u8>>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    pub urls: Mutex<Vec<String>>,
}

impl PayloadDownloader {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Mutex::new(payload.into()),
            fail: false,
            gate: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Download completes only after `notify` fires
    pub fn blocking(payload: impl Into<Vec<u8>>, notify: Arc<Notify>) -> Self {
        Self {
            gate: Some(notify),
            ..Self::new(payload)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Serve `payload` from the next download on
    pub fn set_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.payload.lock() = payload.into();
    }

    pub fn call_count(&self) -> usize {
        self.urls.lock().len()
    }
}

#[async_trait]
impl ArchiveDownloader for PayloadDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.urls.lock().push(url.to_string());
        if let Some(notify) = &self.gate {
            notify.notified().await;
        }
        if self.fail {
            return Err(Error::DownloadError(format!("HTTP 404 for {url}")));
        }
        let payload = self.payload.lock().clone();
        tokio::fs::write(dest, payload).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "payload"
    }
}

/// Extractor that places the archive bytes at `data/<file_name>`
pub struct FlatExtractor {
    file_name: String,
}

impl FlatExtractor {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
        }
    }
}

#[async_trait]
impl Extractor for FlatExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let data = dest.join("data");
        tokio::fs::create_dir_all(&data).await?;
        tokio::fs::copy(archive, data.join(&self.file_name)).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "flat"
    }
}

/// Signer that records its calls and writes an empty artifact
#[derive(Default)]
pub struct RecordingSigner {
    pub calls: Mutex<Vec<(PathBuf, PathBuf, String)>>,
}

impl Signer for RecordingSigner {
    fn sign(&self, xml_file: &Path, output_dir: &Path, artifact_name: &str) -> Result<PathBuf> {
        self.calls.lock().push((
            xml_file.to_path_buf(),
            output_dir.to_path_buf(),
            artifact_name.to_string(),
        ));
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{artifact_name}.knxprod"));
        std::fs::write(&path, b"")?;
        Ok(path)
    }
}

/// Build a gzipped tar archive containing `data/<name>` entries
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("data/{name}"), content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a deflated zip archive containing `data/<name>` entries
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(format!("data/{name}"), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A toolbox over a fresh temporary storage root
pub struct Fixture {
    pub dir: TempDir,
    pub lister: Arc<StaticLister>,
    pub downloader: Arc<PayloadDownloader>,
    pub signer: Arc<RecordingSigner>,
    pub toolbox: Toolbox,
}

impl Fixture {
    /// Flat extractor + XML parser, downloading `OGM_XML`
    pub fn new() -> Self {
        Self::with(
            StaticLister::new(sample_catalog()),
            PayloadDownloader::new(OGM_XML),
            Arc::new(FlatExtractor::new("OGM.xml")),
        )
    }

    pub fn with(lister: StaticLister, downloader: PayloadDownloader, extractor: Arc<dyn Extractor>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let lister = Arc::new(lister);
        let downloader = Arc::new(downloader);
        let signer = Arc::new(RecordingSigner::default());

        let toolbox = open_toolbox(dir.path(), &lister, &downloader, extractor.clone(), &signer);
        Self {
            dir,
            lister,
            downloader,
            signer,
            toolbox,
        }
    }

    /// Real archive extractor with `archive` as the download payload
    pub fn with_archive(archive: Vec<u8>) -> Self {
        Self::with(
            StaticLister::new(sample_catalog()),
            PayloadDownloader::new(archive),
            Arc::new(ArchiveExtractor::new()),
        )
    }

    pub fn storage(&self) -> &Path {
        self.dir.path()
    }

    /// Open a second toolbox over the same storage, as a new process would
    pub fn reopen(&self) -> Toolbox {
        open_toolbox(
            self.dir.path(),
            &self.lister,
            &self.downloader,
            Arc::new(FlatExtractor::new("OGM.xml")),
            &self.signer,
        )
    }
}

fn open_toolbox(
    root: &Path,
    lister: &Arc<StaticLister>,
    downloader: &Arc<PayloadDownloader>,
    extractor: Arc<dyn Extractor>,
    signer: &Arc<RecordingSigner>,
) -> Toolbox {
    let parser: Arc<dyn ContentParser> = Arc::new(XmlContentParser::new());
    let signer: Arc<dyn Signer> = signer.clone();
    let capabilities = Capabilities {
        lister: lister.clone(),
        downloader: downloader.clone(),
        extractor,
        parser,
        signer: Some(signer),
    };
    Toolbox::open(CacheStore::new(root), capabilities, true).unwrap()
}
