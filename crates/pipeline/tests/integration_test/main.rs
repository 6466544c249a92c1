/// Integration tests running normalizer, store, importer, executor and
/// reporter together the way an import run does.
mod end_to_end;
mod helpers;
mod import_run;
