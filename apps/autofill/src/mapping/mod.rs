//! Value mapper: resolves the profile value for a field type.
//!
//! Pure: `None` means the profile has no data for the field. Blank strings in
//! the profile count as missing; an empty string is never produced in place
//! of missing data.

use chrono::{Datelike, NaiveDate};

use crate::models::profile::{Education, WorkExperience};
use crate::models::{Field, FieldType, Profile};

pub fn map_value(field_type: FieldType, profile: &Profile, today: NaiveDate) -> Option<String> {
    let info = &profile.personal_info;
    let current_job = profile.work_experiences.first();
    let education = profile.educations.first();

    match field_type {
        FieldType::FirstName => present(&info.first_name),
        FieldType::LastName => present(&info.last_name),
        FieldType::FullName => {
            let first = present(&info.first_name)?;
            let last = present(&info.last_name)?;
            Some(format!("{first} {last}"))
        }
        FieldType::Email => present(&info.email),
        FieldType::Phone => present(&info.phone),
        FieldType::Address => present(&info.address.street),
        FieldType::City => present(&info.address.city),
        FieldType::State => present(&info.address.state),
        FieldType::ZipCode => present(&info.address.zip),
        FieldType::Country => present(&info.address.country),
        FieldType::Linkedin => present(&info.links.linkedin),
        FieldType::Github => present(&info.links.github),
        FieldType::Portfolio => present(&info.links.portfolio),
        FieldType::CurrentCompany => current_job.and_then(|j| present(&j.company)),
        FieldType::CurrentPosition => current_job.and_then(|j| present(&j.title)),
        FieldType::YearsOfExperience => years_of_experience(&profile.work_experiences, today),
        FieldType::Education => education.map(education_summary),
        FieldType::Degree => education.and_then(|e| present(&e.degree)),
        FieldType::School => education.and_then(|e| present(&e.institution)),
        FieldType::Field => education.and_then(|e| present(&e.field)),
        FieldType::Skills => {
            let skills: Vec<&str> = profile
                .skills
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            (!skills.is_empty()).then(|| skills.join(", "))
        }
        FieldType::Unclassified => None,
    }
}

/// Fills `mapped_value` for every field from the profile.
pub fn map_fields(fields: &mut [Field], profile: &Profile, today: NaiveDate) {
    for field in fields {
        field.mapped_value = map_value(field.field_type(), profile, today);
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `"{degree} in {field} from {institution}"`, with missing parts left empty.
fn education_summary(education: &Education) -> String {
    format!(
        "{} in {} from {}",
        education.degree.as_deref().unwrap_or_default(),
        education.field.as_deref().unwrap_or_default(),
        education.institution.as_deref().unwrap_or_default(),
    )
}

/// Total months across all roles, rounded to whole years. Roles without a
/// start date count for nothing; open-ended roles run until `today`.
pub fn years_of_experience(experiences: &[WorkExperience], today: NaiveDate) -> Option<String> {
    if experiences.is_empty() {
        return None;
    }

    let now = (today.year(), today.month());
    let total_months: i64 = experiences
        .iter()
        .map(|exp| {
            let Some(start) = exp.start_date.as_deref().and_then(parse_year_month) else {
                return 0;
            };
            let end = if exp.is_current() {
                now
            } else {
                exp.end_date
                    .as_deref()
                    .and_then(parse_year_month)
                    .unwrap_or(now)
            };
            months_between(start, end)
        })
        .sum();

    let years = (total_months as f64 / 12.0).round() as i64;
    Some(years.to_string())
}

fn months_between(start: (i32, u32), end: (i32, u32)) -> i64 {
    let months = (end.0 as i64 - start.0 as i64) * 12 + (end.1 as i64 - start.1 as i64);
    months.max(0)
}

/// `YYYY-MM` or `YYYY-MM-DD` (anything after the month is ignored).
fn parse_year_month(value: &str) -> Option<(i32, u32)> {
    let mut parts = value.trim().split(['-', '/']);
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{Address, Links, PersonalInfo};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn full_profile() -> Profile {
        Profile {
            personal_info: PersonalInfo {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                email: Some("ada@example.com".into()),
                phone: Some("555-123-4567".into()),
                address: Address {
                    street: Some("12 St James's Square".into()),
                    city: Some("London".into()),
                    state: Some("California".into()),
                    zip: Some("94105".into()),
                    country: Some("United States".into()),
                },
                links: Links {
                    linkedin: Some("https://linkedin.com/in/ada".into()),
                    github: Some("https://github.com/ada".into()),
                    portfolio: None,
                },
            },
            work_experiences: vec![
                WorkExperience {
                    company: Some("Analytical Engines".into()),
                    title: Some("Engineer".into()),
                    start_date: Some("2022-01".into()),
                    current: Some(true),
                    ..WorkExperience::default()
                },
                WorkExperience {
                    company: Some("Difference Ltd".into()),
                    title: Some("Intern".into()),
                    start_date: Some("2020-01".into()),
                    end_date: Some("2022-01".into()),
                    ..WorkExperience::default()
                },
            ],
            educations: vec![Education {
                institution: Some("MIT".into()),
                degree: Some("BSc".into()),
                field: Some("Mathematics".into()),
                ..Education::default()
            }],
            skills: vec!["Python".into(), "Go".into()],
        }
    }

    #[test]
    fn test_empty_profile_maps_every_type_to_none() {
        let empty = Profile::default();
        for ft in FieldType::ALL {
            assert_eq!(map_value(ft, &empty, today()), None, "{ft:?}");
        }
    }

    #[test]
    fn test_direct_fields() {
        let p = full_profile();
        assert_eq!(map_value(FieldType::FirstName, &p, today()).as_deref(), Some("Ada"));
        assert_eq!(map_value(FieldType::City, &p, today()).as_deref(), Some("London"));
        assert_eq!(map_value(FieldType::ZipCode, &p, today()).as_deref(), Some("94105"));
        assert_eq!(
            map_value(FieldType::Github, &p, today()).as_deref(),
            Some("https://github.com/ada")
        );
        assert_eq!(map_value(FieldType::Portfolio, &p, today()), None);
    }

    #[test]
    fn test_full_name_needs_both_parts() {
        let mut p = full_profile();
        assert_eq!(
            map_value(FieldType::FullName, &p, today()).as_deref(),
            Some("Ada Lovelace")
        );
        p.personal_info.last_name = None;
        assert_eq!(map_value(FieldType::FullName, &p, today()), None);
    }

    #[test]
    fn test_blank_leaf_is_missing() {
        let mut p = full_profile();
        p.personal_info.email = Some("   ".into());
        assert_eq!(map_value(FieldType::Email, &p, today()), None);
    }

    #[test]
    fn test_current_job_is_first_experience() {
        let p = full_profile();
        assert_eq!(
            map_value(FieldType::CurrentCompany, &p, today()).as_deref(),
            Some("Analytical Engines")
        );
        assert_eq!(
            map_value(FieldType::CurrentPosition, &p, today()).as_deref(),
            Some("Engineer")
        );
    }

    #[test]
    fn test_years_of_experience_sums_months() {
        let p = full_profile();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            map_value(FieldType::YearsOfExperience, &p, now).as_deref(),
            Some("4")
        );
    }

    #[test]
    fn test_years_of_experience_rounds_and_skips_undated() {
        let experiences = vec![
            WorkExperience {
                start_date: Some("2021-01".into()),
                end_date: Some("2022-07".into()),
                ..WorkExperience::default()
            },
            WorkExperience::default(),
        ];
        // 18 months → 1.5 → rounds to 2
        assert_eq!(years_of_experience(&experiences, today()).as_deref(), Some("2"));
        assert_eq!(years_of_experience(&[], today()), None);
    }

    #[test]
    fn test_missing_end_date_runs_until_today() {
        let experiences = vec![WorkExperience {
            start_date: Some("2023-01-10".into()),
            ..WorkExperience::default()
        }];
        assert_eq!(years_of_experience(&experiences, today()).as_deref(), Some("1"));
    }

    #[test]
    fn test_extreme_years_do_not_overflow() {
        assert_eq!(
            months_between((i32::MIN, 1), (i32::MAX, 12)),
            (u32::MAX as i64) * 12 + 11
        );
        assert_eq!(months_between((i32::MAX, 1), (i32::MIN, 1)), 0);

        let exps = [WorkExperience {
            start_date: Some("2147483647-01".into()),
            end_date: Some("2020-01".into()),
            ..WorkExperience::default()
        }];
        assert_eq!(years_of_experience(&exps, today()).as_deref(), Some("0"));
    }

    #[test]
    fn test_null_current_flag_uses_end_date() {
        let exps = [WorkExperience {
            start_date: Some("2020-01".into()),
            end_date: Some("2022-01".into()),
            current: None,
            ..WorkExperience::default()
        }];
        assert_eq!(years_of_experience(&exps, today()).as_deref(), Some("2"));
    }

    #[test]
    fn test_education_fields() {
        let p = full_profile();
        assert_eq!(
            map_value(FieldType::Education, &p, today()).as_deref(),
            Some("BSc in Mathematics from MIT")
        );
        assert_eq!(map_value(FieldType::School, &p, today()).as_deref(), Some("MIT"));
        assert_eq!(map_value(FieldType::Degree, &p, today()).as_deref(), Some("BSc"));
        assert_eq!(
            map_value(FieldType::Field, &p, today()).as_deref(),
            Some("Mathematics")
        );
    }

    #[test]
    fn test_education_summary_keeps_gaps() {
        let mut p = full_profile();
        p.educations[0].degree = None;
        p.educations[0].field = None;
        assert_eq!(
            map_value(FieldType::Education, &p, today()).as_deref(),
            Some(" in  from MIT")
        );
    }

    #[test]
    fn test_skills_join_and_empty() {
        let mut p = full_profile();
        assert_eq!(
            map_value(FieldType::Skills, &p, today()).as_deref(),
            Some("Python, Go")
        );
        p.skills.clear();
        assert_eq!(map_value(FieldType::Skills, &p, today()), None);
    }

    #[test]
    fn test_map_fields_populates_each_field() {
        use crate::models::ElementRef;
        use uuid::Uuid;

        let session = Uuid::new_v4();
        let mut fields = vec![
            Field::new("Email", FieldType::Email, 0.9, ElementRef { session, index: 0 }),
            Field::new("Other", FieldType::Unclassified, 0.25, ElementRef { session, index: 1 }),
        ];
        map_fields(&mut fields, &full_profile(), today());
        assert_eq!(fields[0].mapped_value.as_deref(), Some("ada@example.com"));
        assert_eq!(fields[1].mapped_value, None);
    }
}
