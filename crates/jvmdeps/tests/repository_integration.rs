//! Session over a real `MavenRepositoryClient` talking to a mock repository.

use jvmdeps::config::RegistryConfig;
use jvmdeps::{CancellationToken, EngineConfig, Session};
use std::fs;

const METADATA: &str = r"<metadata>
  <groupId>com.google.guava</groupId>
  <artifactId>guava</artifactId>
  <versioning>
    <versions>
      <version>31.0-jre</version>
      <version>32.1.3-jre</version>
      <version>33.2.1-jre</version>
    </versions>
  </versioning>
</metadata>
";

#[tokio::test]
async fn test_outdated_against_mock_repository() {
    let mut server = mockito::Server::new_async().await;
    let metadata = server
        .mock("GET", "/maven2/com/google/guava/guava/maven-metadata.xml")
        .with_status(200)
        .with_body(METADATA)
        .expect(1)
        .create_async()
        .await;

    let project = tempfile::tempdir().unwrap();
    let local = tempfile::tempdir().unwrap();
    let module = project.path().join("app");
    fs::create_dir_all(&module).unwrap();
    fs::write(
        module.join("build.gradle"),
        "dependencies {\n    implementation 'com.google.guava:guava:31.0-jre'\n}\n",
    )
    .unwrap();

    let config = EngineConfig {
        registry: RegistryConfig {
            search_url: format!("{}/search", server.url()),
            repository_url: format!("{}/maven2/", server.url()),
            local_repository: Some(local.path().to_path_buf()),
        },
        ..EngineConfig::default()
    };
    let session = Session::from_config(config);
    let report = session.scan(project.path()).await.unwrap();
    assert_eq!(report.dependencies.len(), 1);

    let cancel = CancellationToken::new();
    let outdated = session.outdated(&report, &cancel).await;
    assert_eq!(outdated.dependencies.len(), 1);
    assert_eq!(outdated.dependencies[0].latest_version, "33.2.1-jre");

    // A second session-level query is answered from the version cache.
    session.outdated(&report, &cancel).await;
    metadata.assert_async().await;
    let stats = session.cache_stats();
    assert_eq!(stats.versions.size, 1);
    assert!(stats.http.is_some_and(|http| http.size == 1));

    let edit = session
        .plan_version_update(&module.join("build.gradle"), "com.google.guava:guava", "33.2.1-jre")
        .unwrap()
        .unwrap();
    session.apply(&edit, "Update guava").unwrap();
    assert!(
        fs::read_to_string(module.join("build.gradle"))
            .unwrap()
            .contains("'com.google.guava:guava:33.2.1-jre'")
    );
}
