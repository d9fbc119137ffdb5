//! Default command payloads.
//!
//! The worker never inspects these scripts; it only knows which role a
//! payload plays and which capability class it needs. Every payload can be
//! overridden from the `[commands]` config section.
//!
//! Output contract (see [`crate::parser`]):
//! - status: first line is the adapter status (compared against `expected_status`)
//! - count: first line is an integer
//! - list: one `MAC|Name|IPs` line per client

use serde::{Deserialize, Serialize};

use crate::channel::CapabilityClass;
use crate::config::schema::CommandsConfig;

/// Shell dialect of the configured interpreters.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ShellDialect {
    /// PowerShell (Windows mobile hotspot via the WinRT tethering manager).
    #[default]
    #[serde(rename = "powershell")]
    PowerShell,
    /// POSIX `sh` (NetworkManager connection named `Hotspot`).
    Posix,
}

/// Role a command plays in the reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandRole {
    /// Query the hotspot status.
    Status,
    /// Start sharing.
    Start,
    /// Stop sharing.
    Stop,
    /// Enumerate attached clients.
    ListClients,
    /// Count attached clients.
    CountClients,
}

impl CommandRole {
    /// Capability class the resident channel needs to run this role.
    pub fn class(self) -> CapabilityClass {
        match self {
            CommandRole::Status => CapabilityClass::Basic,
            CommandRole::Start
            | CommandRole::Stop
            | CommandRole::ListClients
            | CommandRole::CountClients => CapabilityClass::Tethering,
        }
    }
}

// ---------------------------------------------------------------------------
// PowerShell payloads
// ---------------------------------------------------------------------------

const PS_STATUS: &str = "Get-NetAdapter | Where-Object {$_.InterfaceDescription -like '*Wi-Fi Direct Virtual Adapter*'} | Select-Object -First 1 -ExpandProperty Status";

/// Loads the WinRT tethering manager for the current internet profile and
/// defines `Await` for WinRT async operations.
const PS_TETHERING_PRELUDE: &str = r#"
[Windows.System.UserProfile.LockScreen,Windows.System.UserProfile,ContentType=WindowsRuntime] | Out-Null
Add-Type -AssemblyName System.Runtime.WindowsRuntime
$asTaskGeneric = ([System.WindowsRuntimeSystemExtensions].GetMethods() | ? { $_.Name -eq 'AsTask' -and $_.GetParameters().Count -eq 1 -and $_.GetParameters()[0].ParameterType.Name -eq 'IAsyncOperation`1' })[0]
Function Await($WinRtTask, $ResultType) {
    $asTask = $asTaskGeneric.MakeGenericMethod($ResultType)
    $netTask = $asTask.Invoke($null, @($WinRtTask))
    $netTask.Wait(-1) | Out-Null
    $netTask.Result
}
$connectionProfile = [Windows.Networking.Connectivity.NetworkInformation,Windows.Networking.Connectivity,ContentType=WindowsRuntime]::GetInternetConnectionProfile()
$tetheringManager = [Windows.Networking.NetworkOperators.NetworkOperatorTetheringManager,Windows.Networking.NetworkOperators,ContentType=WindowsRuntime]::CreateFromConnectionProfile($connectionProfile)
"#;

/// Makes sure the WinRM service is running before reactivation.
const PS_ENSURE_WINRM: &str = r#"
$winrm = Get-Service -Name WinRM -ErrorAction SilentlyContinue
if ($winrm -and $winrm.Status -ne 'Running') { Start-Service -Name WinRM }
"#;

const PS_START: &str = r#"
$result = Await ($tetheringManager.StartTetheringAsync()) ([Windows.Networking.NetworkOperators.NetworkOperatorTetheringOperationResult])
$result.Status
"#;

const PS_STOP: &str = r#"
$result = Await ($tetheringManager.StopTetheringAsync()) ([Windows.Networking.NetworkOperators.NetworkOperatorTetheringOperationResult])
$result.Status
"#;

const PS_LIST_CLIENTS: &str = r#"
foreach ($client in $tetheringManager.GetTetheringClients()) {
    $name = ($client.HostNames | Where-Object { $_.Type -eq 'DomainName' } | Select-Object -First 1).DisplayName
    $ips = @($client.HostNames | Where-Object { $_.Type -eq 'Ipv4' -or $_.Type -eq 'Ipv6' } | ForEach-Object { $_.CanonicalName }) -join ','
    "{0}|{1}|{2}" -f $client.MacAddress, $name, $ips
}
"#;

const PS_COUNT_CLIENTS: &str = "$tetheringManager.ClientCount";

const PS_SELF_TEST_BASIC: &str = "Write-Output 'ok'";

const PS_SELF_TEST_TETHERING: &str = "[Windows.Networking.NetworkOperators.NetworkOperatorTetheringManager,Windows.Networking.NetworkOperators,ContentType=WindowsRuntime] | Out-Null; Write-Output 'ok'";

// ---------------------------------------------------------------------------
// POSIX payloads
// ---------------------------------------------------------------------------

const SH_STATUS: &str =
    "nmcli -t -f NAME connection show --active | grep -qx Hotspot && echo Up || echo Down";

const SH_START: &str = "nmcli connection up Hotspot";

const SH_STOP: &str = "nmcli connection down Hotspot";

const SH_HOTSPOT_DEVICE: &str =
    "dev=$(nmcli -t -f NAME,DEVICE connection show --active | awk -F: '$1==\"Hotspot\"{print $2}')";

const SH_LIST_CLIENTS: &str =
    "if [ -n \"$dev\" ]; then ip neigh show dev \"$dev\" | awk '$2==\"lladdr\"{print $3 \"||\" $1}'; fi";

const SH_COUNT_CLIENTS: &str =
    "if [ -n \"$dev\" ]; then ip neigh show dev \"$dev\" | grep -c lladdr; else echo 0; fi";

const SH_SELF_TEST: &str = "echo ok";

/// Expected first line of every capability self-test.
pub const SELF_TEST_TOKEN: &str = "ok";

/// Concrete payloads for every command role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotspotCommands {
    /// Status query.
    pub status: String,
    /// Start sharing.
    pub start: String,
    /// Stop sharing.
    pub stop: String,
    /// Client listing.
    pub list_clients: String,
    /// Client count.
    pub count_clients: String,
    dialect: ShellDialect,
}

impl HotspotCommands {
    /// Built-in payloads for the given dialect.
    pub fn for_dialect(dialect: ShellDialect) -> Self {
        match dialect {
            ShellDialect::PowerShell => Self {
                status: PS_STATUS.to_string(),
                start: format!("{PS_ENSURE_WINRM}{PS_TETHERING_PRELUDE}{PS_START}"),
                stop: format!("{PS_TETHERING_PRELUDE}{PS_STOP}"),
                list_clients: format!("{PS_TETHERING_PRELUDE}{PS_LIST_CLIENTS}"),
                count_clients: format!("{PS_TETHERING_PRELUDE}{PS_COUNT_CLIENTS}"),
                dialect,
            },
            ShellDialect::Posix => Self {
                status: SH_STATUS.to_string(),
                start: SH_START.to_string(),
                stop: SH_STOP.to_string(),
                list_clients: format!("{SH_HOTSPOT_DEVICE}\n{SH_LIST_CLIENTS}"),
                count_clients: format!("{SH_HOTSPOT_DEVICE}\n{SH_COUNT_CLIENTS}"),
                dialect,
            },
        }
    }

    /// Built-in payloads with every non-empty override applied.
    pub fn from_config(dialect: ShellDialect, overrides: &CommandsConfig) -> Self {
        let mut commands = Self::for_dialect(dialect);
        let pairs = [
            (&mut commands.status, &overrides.status),
            (&mut commands.start, &overrides.start),
            (&mut commands.stop, &overrides.stop),
            (&mut commands.list_clients, &overrides.list_clients),
            (&mut commands.count_clients, &overrides.count_clients),
        ];
        for (slot, value) in pairs {
            if !value.trim().is_empty() {
                slot.clone_from(value);
            }
        }
        commands
    }

    /// Payload for a role.
    pub fn get(&self, role: CommandRole) -> &str {
        match role {
            CommandRole::Status => &self.status,
            CommandRole::Start => &self.start,
            CommandRole::Stop => &self.stop,
            CommandRole::ListClients => &self.list_clients,
            CommandRole::CountClients => &self.count_clients,
        }
    }

    /// Dialect these payloads were written for.
    pub fn dialect(&self) -> ShellDialect {
        self.dialect
    }
}

/// Cheap command that succeeds only if the resident channel can serve `class`.
///
/// Must print [`SELF_TEST_TOKEN`] on its first line.
pub fn self_test(dialect: ShellDialect, class: CapabilityClass) -> &'static str {
    match (dialect, class) {
        (ShellDialect::PowerShell, CapabilityClass::Basic) => PS_SELF_TEST_BASIC,
        (ShellDialect::PowerShell, CapabilityClass::Tethering) => PS_SELF_TEST_TETHERING,
        (ShellDialect::Posix, _) => SH_SELF_TEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_role_needs_only_basic_capability() {
        assert_eq!(CommandRole::Status.class(), CapabilityClass::Basic);
    }

    #[test]
    fn tethering_roles_need_tethering_capability() {
        for role in [
            CommandRole::Start,
            CommandRole::Stop,
            CommandRole::ListClients,
            CommandRole::CountClients,
        ] {
            assert_eq!(role.class(), CapabilityClass::Tethering, "{role:?}");
        }
    }

    #[test]
    fn powershell_tethering_payloads_include_prelude() {
        let commands = HotspotCommands::for_dialect(ShellDialect::PowerShell);
        assert!(commands.start.contains("StartTetheringAsync"));
        assert!(commands.stop.contains("StopTetheringAsync"));
        for payload in [&commands.start, &commands.stop, &commands.list_clients] {
            assert!(payload.contains("CreateFromConnectionProfile"));
        }
        assert!(!commands.status.contains("CreateFromConnectionProfile"));
    }

    #[test]
    fn powershell_start_ensures_winrm_first() {
        let commands = HotspotCommands::for_dialect(ShellDialect::PowerShell);
        let service = commands
            .start
            .find("Start-Service -Name WinRM")
            .expect("start should ensure WinRM");
        let tethering = commands
            .start
            .find("StartTetheringAsync")
            .expect("start should start tethering");
        assert!(service < tethering);
        assert!(!commands.stop.contains("WinRM"));
    }

    #[test]
    fn overrides_replace_only_non_empty_fields() {
        let overrides = CommandsConfig {
            status: "echo Up".to_string(),
            count_clients: "   ".to_string(),
            ..CommandsConfig::default()
        };
        let commands = HotspotCommands::from_config(ShellDialect::Posix, &overrides);
        assert_eq!(commands.status, "echo Up");
        assert_eq!(commands.start, SH_START);
        assert!(commands.count_clients.contains("grep -c lladdr"));
    }

    #[test]
    fn get_returns_payload_for_role() {
        let commands = HotspotCommands::for_dialect(ShellDialect::Posix);
        assert_eq!(commands.get(CommandRole::Start), SH_START);
        assert_eq!(commands.get(CommandRole::Stop), SH_STOP);
        assert_eq!(commands.dialect(), ShellDialect::Posix);
    }

    #[test]
    fn self_tests_differ_per_class_for_powershell() {
        let basic = self_test(ShellDialect::PowerShell, CapabilityClass::Basic);
        let tethering = self_test(ShellDialect::PowerShell, CapabilityClass::Tethering);
        assert_ne!(basic, tethering);
        assert!(tethering.contains("NetworkOperatorTetheringManager"));
    }

    #[test]
    fn dialect_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            dialect: ShellDialect,
        }
        let ps: Wrapper = toml::from_str("dialect = \"powershell\"").expect("should parse");
        assert_eq!(ps.dialect, ShellDialect::PowerShell);
        let sh: Wrapper = toml::from_str("dialect = \"posix\"").expect("should parse");
        assert_eq!(sh.dialect, ShellDialect::Posix);
    }
}
