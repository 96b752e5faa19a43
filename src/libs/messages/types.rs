#[derive(Debug, Clone)]
pub enum Message {
    // === AUTH / SESSION MESSAGES ===
    PromptUsername,
    PromptPassword,
    Prompt2faCode,
    PromptTrustedDeviceCode,
    RequiresInteractiveLogin,
    LoginRejected,
    AuthenticationSucceeded,
    SessionValidated,
    SessionInvalidProbe,
    TrustDeviceFailed(String),
    CookieJarSaved,

    // === RUN / ORCHESTRATOR MESSAGES ===
    DownloadingSummary(String),
    StartingSync,
    AllAssetsDownloaded,
    FoundConsecutivePreviouslyDownloaded(u64),
    SkippingOnlyPhotos(String),            // filename
    SkippingUnknownItemType(String, String), // filename, item type
    WatchSleeping(u64),                    // seconds
    InterruptReceived,

    // === LISTING MESSAGES ===
    InternalErrorRetrying,
    InternalErrorFatal,
    ReauthenticationFailedDuringListing,

    // === DOWNLOAD ENGINE MESSAGES ===
    CouldNotConvertCreatedDate(String), // iso timestamp
    SizeNotAvailableForceSize(String, String), // size, filename
    CouldNotFindUrlForSize(String, String),    // filename, size
    FileAlreadyExists(String),                 // path
    FileDeduplicated(String),                  // path
    CouldNotCreateFolder(String),              // dir
    IoErrorWritingFile(String),                // path
    SettingExifTimestamp(String, String),      // path, formatted datetime
    ExifError(String),                         // path
    DryRunWouldDelete(String),                 // filename
    ErrorDownloadingRetrying(String, u64),     // filename, wait seconds
    CouldNotDownload(String),                  // filename
    SessionErrorReauthenticating,
    DeleteFailed(String, String), // filename, reason

    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigLoaded,
    ConfigInitHeader,
    PromptDefaultAlbum,
    PromptDefaultDirectory,
    PromptDefaultSizes,
    PromptThreadsNum,
    PromptKeepUnicode,
    ClientIdGenerated(String),
}
