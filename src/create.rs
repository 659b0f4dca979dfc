use crate::model::ClusterSettings;

pub const CONTAINER_RUNTIMES: [&str; 3] = ["docker", "containerd", "crio"];

pub fn driver_options() -> Vec<&'static str> {
    let mut drivers = vec!["docker"];
    if cfg!(target_os = "linux") {
        drivers.push("kvm2");
    } else if cfg!(target_os = "macos") {
        drivers.extend(["hyperkit", "parallels"]);
    } else {
        drivers.push("hyperv");
    }
    drivers.extend(["virtualbox", "vmware", "podman"]);
    drivers
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CreateStage {
    Profile,
    Custom,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProfileChoice {
    UseDefaults,
    SetCustom,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CreateField {
    Driver,
    ContainerRuntime,
    Cpus,
    Memory,
}

impl CreateField {
    pub const ALL: [Self; 4] = [Self::Driver, Self::ContainerRuntime, Self::Cpus, Self::Memory];

    pub fn label(self) -> &'static str {
        match self {
            Self::Driver => "Driver",
            Self::ContainerRuntime => "Container Runtime",
            Self::Cpus => "CPUs",
            Self::Memory => "Memory",
        }
    }

    fn offset(self, delta: isize) -> Self {
        let index = Self::ALL.iter().position(|field| *field == self).unwrap_or(0) as isize;
        let len = Self::ALL.len() as isize;
        Self::ALL[(index + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CreateOutcome {
    Pending,
    Cancelled(ClusterSettings),
    Submit {
        settings: ClusterSettings,
        custom: bool,
    },
}

/// Two-step create dialog: profile name, then optional custom values.
///
/// The settings it was opened with are edited in place and handed back on
/// every exit path, so the caller can seed the next dialog with them.
#[derive(Debug, Clone)]
pub struct CreateForm {
    settings: ClusterSettings,
    stage: CreateStage,
    choice: ProfileChoice,
    profile_input: String,
    drivers: Vec<&'static str>,
    driver_index: usize,
    runtime_index: usize,
    cpus_input: String,
    memory_input: String,
    field: CreateField,
    error: Option<String>,
}

impl CreateForm {
    pub fn new(settings: ClusterSettings) -> Self {
        let drivers = driver_options();
        let driver_index = drivers
            .iter()
            .position(|driver| *driver == settings.driver)
            .unwrap_or(0);
        let runtime_index = CONTAINER_RUNTIMES
            .iter()
            .position(|runtime| *runtime == settings.container_runtime)
            .unwrap_or(0);

        Self {
            stage: CreateStage::Profile,
            choice: ProfileChoice::UseDefaults,
            profile_input: settings.profile.clone(),
            drivers,
            driver_index,
            runtime_index,
            cpus_input: settings.cpus.to_string(),
            memory_input: settings.memory_mb.to_string(),
            field: CreateField::Driver,
            error: None,
            settings,
        }
    }

    pub fn stage(&self) -> CreateStage {
        self.stage
    }

    pub fn choice(&self) -> ProfileChoice {
        self.choice
    }

    pub fn profile_input(&self) -> &str {
        &self.profile_input
    }

    pub fn focused_field(&self) -> CreateField {
        self.field
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn field_value(&self, field: CreateField) -> &str {
        match field {
            CreateField::Driver => self.drivers.get(self.driver_index).copied().unwrap_or(""),
            CreateField::ContainerRuntime => CONTAINER_RUNTIMES[self.runtime_index],
            CreateField::Cpus => &self.cpus_input,
            CreateField::Memory => &self.memory_input,
        }
    }

    pub fn input_char(&mut self, c: char) {
        self.error = None;
        match self.stage {
            CreateStage::Profile => self.profile_input.push(c),
            CreateStage::Custom => match self.field {
                CreateField::Cpus => self.cpus_input.push(c),
                CreateField::Memory => self.memory_input.push(c),
                CreateField::Driver | CreateField::ContainerRuntime => {}
            },
        }
    }

    pub fn backspace(&mut self) {
        match self.stage {
            CreateStage::Profile => {
                self.profile_input.pop();
            }
            CreateStage::Custom => match self.field {
                CreateField::Cpus => {
                    self.cpus_input.pop();
                }
                CreateField::Memory => {
                    self.memory_input.pop();
                }
                CreateField::Driver | CreateField::ContainerRuntime => {}
            },
        }
    }

    pub fn move_focus(&mut self, delta: isize) {
        match self.stage {
            CreateStage::Profile => self.toggle_choice(),
            CreateStage::Custom => self.field = self.field.offset(delta),
        }
    }

    /// Steps the focused choice list, or flips the profile-step button.
    pub fn cycle(&mut self, delta: isize) {
        match (self.stage, self.field) {
            (CreateStage::Profile, _) => self.toggle_choice(),
            (CreateStage::Custom, CreateField::Driver) => {
                self.driver_index = step_index(self.driver_index, self.drivers.len(), delta);
            }
            (CreateStage::Custom, CreateField::ContainerRuntime) => {
                self.runtime_index =
                    step_index(self.runtime_index, CONTAINER_RUNTIMES.len(), delta);
            }
            (CreateStage::Custom, _) => {}
        }
    }

    fn toggle_choice(&mut self) {
        self.choice = match self.choice {
            ProfileChoice::UseDefaults => ProfileChoice::SetCustom,
            ProfileChoice::SetCustom => ProfileChoice::UseDefaults,
        };
    }

    pub fn submit(&mut self) -> CreateOutcome {
        match self.stage {
            CreateStage::Profile => {
                let profile = self.profile_input.trim().to_string();
                if profile.is_empty() {
                    self.error = Some("Profile name is required".to_string());
                    return CreateOutcome::Pending;
                }
                self.settings.profile = profile;
                match self.choice {
                    ProfileChoice::UseDefaults => CreateOutcome::Submit {
                        settings: self.settings.clone(),
                        custom: false,
                    },
                    ProfileChoice::SetCustom => {
                        self.stage = CreateStage::Custom;
                        self.field = CreateField::Driver;
                        CreateOutcome::Pending
                    }
                }
            }
            CreateStage::Custom => {
                self.settings.driver = self.field_value(CreateField::Driver).to_string();
                self.settings.container_runtime =
                    CONTAINER_RUNTIMES[self.runtime_index].to_string();
                self.settings.cpus = parse_number(&self.cpus_input);
                self.settings.memory_mb = parse_number(&self.memory_input);
                CreateOutcome::Submit {
                    settings: self.settings.clone(),
                    custom: true,
                }
            }
        }
    }

    /// Keeps a profile name typed before cancelling, as the dialog always has.
    pub fn cancel(self) -> CreateOutcome {
        let mut settings = self.settings;
        let profile = self.profile_input.trim();
        if !profile.is_empty() {
            settings.profile = profile.to_string();
        }
        CreateOutcome::Cancelled(settings)
    }
}

fn step_index(index: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (index as isize + delta).rem_euclid(len as isize) as usize
}

/// Non-numeric input becomes 0 and is left for the tool to reject.
fn parse_number(input: &str) -> i64 {
    input.trim().parse().unwrap_or(0)
}
